//! Rule reconciler: turns desired state plus an inventory snapshot into a plan.
//!
//! # Responsibilities
//! - Resolve requested rule names against the inventory
//! - Decide each rule's new target and its outcome
//! - Reuse or create the shared maintenance redirect
//! - Capture pre-maintenance targets for the state-persisted variant
//! - Leave path-based rules alone; their path map cannot be restored
//!
//! # Design Decisions
//! - Pure: no I/O, the inventory is never mutated
//! - A rule already in the desired state produces no mutation
//! - Only redirect configurations created by this tool are ever removed

use std::collections::BTreeSet;

use thiserror::Error;

use crate::gateway::{Inventory, RedirectConfiguration, RoutingRule, RuleTarget};
use crate::reconcile::desired::{Action, MaintenanceSpec};
use crate::reconcile::outcome::{Plan, RuleOutcome, RuleStatus};
use crate::reconcile::restoration::{Restoration, RestorationSource};
use crate::state::CapturedTarget;

/// Name (and prefix) of redirect configurations created by this tool.
pub const MAINTENANCE_REDIRECT_NAME: &str = "maintenance-redirect";

/// Errors that stop a switch before anything is applied.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// None of the requested rules exist on the gateway.
    #[error("none of the {action} rules exist on the gateway: {}", requested.join(", "))]
    NoRulesMatched {
        action: Action,
        requested: Vec<String>,
    },
}

/// Plans switches against one inventory snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    inventory: &'a Inventory,
}

impl<'a> Reconciler<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        Self { inventory }
    }

    /// Plan moving `spec.rules` to the maintenance redirect.
    ///
    /// With `capture` set, every rule leaving a backend has that backend
    /// captured into `Plan::captures`. Rules already redirecting capture
    /// nothing, so their existing record stays.
    pub fn maintenance(
        &self,
        spec: &MaintenanceSpec,
        capture: bool,
        now: u64,
    ) -> Result<Plan, ReconcileError> {
        let requested = self.resolve(Action::Maintenance, &spec.rules)?;
        let mut plan = Plan::new(Action::Maintenance);

        let existing = self
            .inventory
            .redirects
            .iter()
            .find(|r| r.is_permanent_redirect_to(&spec.redirect_url));
        let redirect_name = match existing {
            Some(redirect) => {
                tracing::debug!(redirect = %redirect.name, "Reusing existing redirect configuration");
                redirect.name.clone()
            }
            None => self.fresh_redirect_name(),
        };
        let desired = RuleTarget::redirect(&redirect_name);

        for (name, rule) in requested {
            let Some(rule) = rule else {
                plan.outcomes.push(RuleOutcome::new(name, RuleStatus::SkippedNotFound, None));
                continue;
            };

            if rule.target == desired {
                tracing::info!(rule = %name, "Rule already in maintenance");
                plan.outcomes.push(RuleOutcome::new(
                    name,
                    RuleStatus::Unchanged,
                    Some(desired.clone()),
                ));
                continue;
            }

            if rule.target == RuleTarget::Unset {
                tracing::warn!(rule = %name, "Rule has no direct backend (path-based routing), leaving it untouched");
                let mut outcome = RuleOutcome::new(
                    name,
                    RuleStatus::SkippedMissingReference,
                    Some(rule.target.clone()),
                );
                outcome
                    .warnings
                    .push("no direct backend target, path-based rules are not switched".to_string());
                plan.outcomes.push(outcome);
                continue;
            }

            if capture {
                capture_backend(rule, now, &mut plan);
            }

            tracing::info!(rule = %name, from = %rule.target, to = %desired, "Rule will redirect");
            plan.patch.rule_targets.insert(name.to_string(), desired.clone());
            plan.outcomes.push(RuleOutcome::new(
                name,
                RuleStatus::Updated,
                Some(desired.clone()),
            ));
        }

        if existing.is_none() && !plan.patch.rule_targets.is_empty() {
            plan.patch.added_redirects.push(RedirectConfiguration::maintenance(
                redirect_name,
                spec.redirect_url.clone(),
            ));
        }

        self.prune_redirects(&mut plan);
        Ok(plan)
    }

    /// Plan restoring rules to their backends.
    pub fn normal(&self, source: RestorationSource<'_>) -> Result<Plan, ReconcileError> {
        let rules = source.rules();
        let requested = self.resolve(Action::Normal, &rules)?;
        let mut plan = Plan::new(Action::Normal);

        for (name, rule) in requested {
            let Some(rule) = rule else {
                plan.outcomes.push(RuleOutcome::new(name, RuleStatus::SkippedNotFound, None));
                continue;
            };
            let current = Some(rule.target.clone());

            let (pool, settings) = match source.lookup(name) {
                Restoration::Target {
                    backend_pool,
                    backend_settings,
                } => (backend_pool, backend_settings),
                Restoration::Missing => {
                    tracing::warn!(rule = %name, "No restoration record, leaving rule untouched");
                    let mut outcome = RuleOutcome::new(name, RuleStatus::SkippedNotFound, current);
                    outcome.warnings.push("no restoration record".to_string());
                    plan.outcomes.push(outcome);
                    continue;
                }
                Restoration::Incomplete => {
                    tracing::warn!(rule = %name, "Restoration record has no backend pool, leaving rule untouched");
                    let mut outcome =
                        RuleOutcome::new(name, RuleStatus::SkippedMissingReference, current);
                    outcome
                        .warnings
                        .push("restoration record has no backend pool".to_string());
                    plan.outcomes.push(outcome);
                    continue;
                }
            };

            if !self.inventory.has_pool(&pool) {
                tracing::error!(rule = %name, backend_pool = %pool, "Backend pool not found, skipping rule");
                let mut outcome = RuleOutcome::new(name, RuleStatus::FailedNoDependency, current);
                outcome
                    .warnings
                    .push(format!("backend pool '{}' not found", pool));
                plan.outcomes.push(outcome);
                continue;
            }

            let mut warnings = Vec::new();
            let settings = match settings {
                Some(s) if !self.inventory.has_settings(&s) => {
                    tracing::warn!(
                        rule = %name,
                        backend_settings = %s,
                        "Backend settings not found, assigning pool only"
                    );
                    warnings.push(format!("backend settings '{}' not found", s));
                    None
                }
                other => other,
            };

            let desired = RuleTarget::Backend { pool, settings };
            let status = if rule.target == desired {
                tracing::info!(rule = %name, "Rule already routes to its backend");
                RuleStatus::Unchanged
            } else {
                tracing::info!(rule = %name, from = %rule.target, to = %desired, "Rule will be restored");
                plan.patch
                    .rule_targets
                    .insert(name.to_string(), desired.clone());
                RuleStatus::Updated
            };

            plan.restored.push(name.to_string());
            let mut outcome = RuleOutcome::new(name, status, Some(desired));
            outcome.warnings = warnings;
            plan.outcomes.push(outcome);
        }

        self.prune_redirects(&mut plan);
        Ok(plan)
    }

    /// Deduplicate requested names and pair them with inventory rules.
    ///
    /// Fails when no requested rule exists.
    fn resolve<'n>(
        &self,
        action: Action,
        names: &'n [String],
    ) -> Result<Vec<(&'n str, Option<&'a RoutingRule>)>, ReconcileError> {
        let mut seen = BTreeSet::new();
        let resolved: Vec<_> = names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| {
                let rule = self.inventory.rule(name);
                if rule.is_none() {
                    tracing::warn!(rule = %name, "Routing rule not found on gateway, skipping");
                }
                (name.as_str(), rule)
            })
            .collect();

        if resolved.iter().all(|(_, rule)| rule.is_none()) {
            return Err(ReconcileError::NoRulesMatched {
                action,
                requested: resolved.iter().map(|(n, _)| n.to_string()).collect(),
            });
        }
        Ok(resolved)
    }

    fn fresh_redirect_name(&self) -> String {
        if self.inventory.redirect(MAINTENANCE_REDIRECT_NAME).is_none() {
            return MAINTENANCE_REDIRECT_NAME.to_string();
        }
        (1..)
            .map(|i| format!("{}-{}", MAINTENANCE_REDIRECT_NAME, i))
            .find(|name| self.inventory.redirect(name).is_none())
            .unwrap_or_else(|| MAINTENANCE_REDIRECT_NAME.to_string())
    }

    /// Remove tool-created redirects left unreferenced by this plan.
    fn prune_redirects(&self, plan: &mut Plan) {
        let after = self.inventory.with_patch(&plan.patch);
        let vacated: BTreeSet<String> = plan
            .patch
            .rule_targets
            .keys()
            .filter_map(|name| self.inventory.rule(name))
            .filter_map(|rule| rule.target.redirect_configuration())
            .filter(|name| name.starts_with(MAINTENANCE_REDIRECT_NAME))
            .map(str::to_string)
            .collect();

        for name in vacated {
            let in_use = after.redirect_references(&name) > 0
                || after.redirect(&name).map_or(true, |r| r.used_by_path_maps);
            if !in_use {
                tracing::info!(redirect = %name, "Redirect configuration no longer used, removing");
                plan.patch.removed_redirects.push(name);
            }
        }
    }
}

/// Record the backend a rule leaves, replacing any older record.
fn capture_backend(rule: &RoutingRule, now: u64, plan: &mut Plan) {
    let RuleTarget::Backend { pool, settings } = &rule.target else {
        tracing::debug!(rule = %rule.name, target = %rule.target, "No backend to capture, keeping existing record");
        return;
    };
    tracing::debug!(rule = %rule.name, backend_pool = %pool, "Captured pre-maintenance target");
    plan.captures.insert(
        rule.name.clone(),
        CapturedTarget {
            backend_pool: Some(pool.clone()),
            backend_settings: settings.clone(),
            captured_at: now,
        },
    );
}
