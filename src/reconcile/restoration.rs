//! Where normal mode gets each rule's backend target from.

use crate::reconcile::desired::{NormalSpec, RestoreEntry};
use crate::state::ReconciliationState;

/// Restoration data for one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restoration {
    /// Restore to this pool and optional settings.
    Target {
        backend_pool: String,
        backend_settings: Option<String>,
    },
    /// A record exists but names no backend pool.
    Incomplete,
    /// Nothing recorded for the rule.
    Missing,
}

/// Restoration capability the reconciler is written against.
#[derive(Debug, Clone, Copy)]
pub enum RestorationSource<'a> {
    /// Targets declared up front in configuration.
    ConfigDeclared(&'a NormalSpec),
    /// Targets captured when the rules entered maintenance.
    StatePersisted {
        state: &'a ReconciliationState,
        rules: &'a [String],
    },
}

impl RestorationSource<'_> {
    /// Rule names to restore, in request order.
    pub fn rules(&self) -> Vec<String> {
        match self {
            RestorationSource::ConfigDeclared(spec) => spec.rule_names(),
            RestorationSource::StatePersisted { rules, .. } => rules.to_vec(),
        }
    }

    /// Restoration data for `rule`.
    pub fn lookup(&self, rule: &str) -> Restoration {
        match self {
            RestorationSource::ConfigDeclared(spec) => spec
                .entries
                .iter()
                .find(|e| e.rule == rule)
                .map(|RestoreEntry { backend_pool, backend_settings, .. }| Restoration::Target {
                    backend_pool: backend_pool.clone(),
                    backend_settings: backend_settings.clone(),
                })
                .unwrap_or(Restoration::Missing),
            RestorationSource::StatePersisted { state, .. } => match state.captured(rule) {
                Some(captured) => match &captured.backend_pool {
                    Some(pool) => Restoration::Target {
                        backend_pool: pool.clone(),
                        backend_settings: captured.backend_settings.clone(),
                    },
                    None => Restoration::Incomplete,
                },
                None => Restoration::Missing,
            },
        }
    }

    pub fn is_state_persisted(&self) -> bool {
        matches!(self, RestorationSource::StatePersisted { .. })
    }
}
