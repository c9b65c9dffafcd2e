//! Per-rule outcomes and the plan produced by the reconciler.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::gateway::{GatewayPatch, RuleTarget};
use crate::reconcile::desired::Action;
use crate::state::CapturedTarget;

/// What happened to one requested rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Target changed.
    Updated,
    /// Already in the desired state.
    Unchanged,
    /// Rule absent from the gateway, or no restoration record for it.
    SkippedNotFound,
    /// Restoration record exists but names no backend pool.
    SkippedMissingReference,
    /// Backend pool to restore to is absent from the gateway.
    FailedNoDependency,
}

impl RuleStatus {
    /// True if the rule ended in the desired state.
    pub fn is_success(&self) -> bool {
        matches!(self, RuleStatus::Updated | RuleStatus::Unchanged)
    }
}

/// Result for one requested rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub status: RuleStatus,
    /// Target after the switch; `None` if the rule does not exist.
    pub target: Option<RuleTarget>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RuleOutcome {
    pub(crate) fn new(rule: &str, status: RuleStatus, target: Option<RuleTarget>) -> Self {
        Self {
            rule: rule.to_string(),
            status,
            target,
            warnings: Vec::new(),
        }
    }
}

/// Everything a switch needs to apply, persist and report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: Action,
    /// Mutations for the single gateway upsert.
    pub patch: GatewayPatch,
    /// One entry per distinct requested rule, in request order.
    pub outcomes: Vec<RuleOutcome>,
    /// New pre-maintenance captures (state-persisted maintenance only).
    pub captures: BTreeMap<String, CapturedTarget>,
    /// Rules whose restoration records can be cleared once applied.
    pub restored: Vec<String>,
}

impl Plan {
    pub(crate) fn new(action: Action) -> Self {
        Self {
            action,
            patch: GatewayPatch::default(),
            outcomes: Vec::new(),
            captures: BTreeMap::new(),
            restored: Vec::new(),
        }
    }

    pub fn count(&self, status: RuleStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Rules that ended in the desired state.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }
}
