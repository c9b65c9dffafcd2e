//! Run summaries printed at the end of a command.

use std::fmt::Write as _;

use serde::Serialize;
use uuid::Uuid;

use crate::gateway::{Inventory, RuleTarget};
use crate::reconcile::{Action, Plan, RuleOutcome, RuleStatus};

/// Overall result of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// At least one rule ended in the desired state.
    Success,
    /// Rules were processed but none ended in the desired state.
    PartialFailure,
}

/// Per-status counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Structured result of one switch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub environment: String,
    pub gateway: String,
    pub action: Action,
    pub dry_run: bool,
    /// True if the gateway update was sent and succeeded.
    pub applied: bool,
    pub verdict: Verdict,
    pub counts: Counts,
    pub rules: Vec<RuleOutcome>,
}

impl RunSummary {
    pub fn new(
        run_id: Uuid,
        environment: &str,
        gateway: String,
        plan: Plan,
        applied: bool,
        dry_run: bool,
    ) -> Self {
        let counts = Counts {
            updated: plan.count(RuleStatus::Updated),
            unchanged: plan.count(RuleStatus::Unchanged),
            skipped: plan.count(RuleStatus::SkippedNotFound)
                + plan.count(RuleStatus::SkippedMissingReference),
            failed: plan.count(RuleStatus::FailedNoDependency),
        };
        let verdict = if plan.succeeded() > 0 {
            Verdict::Success
        } else {
            Verdict::PartialFailure
        };

        Self {
            run_id,
            environment: environment.to_string(),
            gateway,
            action: plan.action,
            dry_run,
            applied,
            verdict,
            counts,
            rules: plan.outcomes,
        }
    }

    /// Process exit code: 0 success, 2 partial failure.
    pub fn exit_code(&self) -> u8 {
        match self.verdict {
            Verdict::Success => 0,
            Verdict::PartialFailure => 2,
        }
    }

    /// Human-readable table.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} switch for '{}' on {}{}",
            self.action,
            self.environment,
            self.gateway,
            if self.dry_run { " (dry run)" } else { "" }
        );
        for outcome in &self.rules {
            let _ = writeln!(
                out,
                "  {:<28} {:<26} {}",
                outcome.rule,
                status_label(outcome.status),
                target_label(outcome.target.as_ref())
            );
            for warning in &outcome.warnings {
                let _ = writeln!(out, "  {:<28} warning: {}", "", warning);
            }
        }
        let _ = writeln!(
            out,
            "updated={} unchanged={} skipped={} failed={} applied={} verdict={}",
            self.counts.updated,
            self.counts.unchanged,
            self.counts.skipped,
            self.counts.failed,
            self.applied,
            match self.verdict {
                Verdict::Success => "success",
                Verdict::PartialFailure => "partial_failure",
            }
        );
        out
    }
}

/// Current target of one rule, as shown by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct RuleState {
    pub rule: String,
    /// `None` if the rule does not exist on the gateway.
    pub target: Option<RuleTarget>,
    /// Redirect URL when the target is a redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Read-only view of the configured rules on a gateway.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub environment: String,
    pub gateway: String,
    pub rules: Vec<RuleState>,
}

impl StatusReport {
    pub fn new(environment: &str, gateway: String, inventory: &Inventory, rules: &[String]) -> Self {
        let rules = rules
            .iter()
            .map(|name| {
                let target = inventory.rule(name).map(|r| r.target.clone());
                let redirect_url = target
                    .as_ref()
                    .and_then(RuleTarget::redirect_configuration)
                    .and_then(|c| inventory.redirect(c))
                    .and_then(|r| r.target_url.clone());
                RuleState {
                    rule: name.clone(),
                    target,
                    redirect_url,
                }
            })
            .collect();

        Self {
            environment: environment.to_string(),
            gateway,
            rules,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "rules of '{}' on {}", self.environment, self.gateway);
        for rule in &self.rules {
            let target = target_label(rule.target.as_ref());
            match &rule.redirect_url {
                Some(url) => {
                    let _ = writeln!(out, "  {:<28} {} -> {}", rule.rule, target, url);
                }
                None => {
                    let _ = writeln!(out, "  {:<28} {}", rule.rule, target);
                }
            }
        }
        out
    }
}

fn status_label(status: RuleStatus) -> &'static str {
    match status {
        RuleStatus::Updated => "updated",
        RuleStatus::Unchanged => "unchanged",
        RuleStatus::SkippedNotFound => "skipped (not found)",
        RuleStatus::SkippedMissingReference => "skipped (missing reference)",
        RuleStatus::FailedNoDependency => "failed (no backend pool)",
    }
}

fn target_label(target: Option<&RuleTarget>) -> String {
    target
        .map(ToString::to_string)
        .unwrap_or_else(|| "not on gateway".to_string())
}
