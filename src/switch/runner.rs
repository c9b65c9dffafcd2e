//! Switch orchestration: fetch, plan, persist, apply, report.

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ConfigError, ResolvedSwitch, RestorationMode, SwitchRequest, ValidationError};
use crate::gateway::{GatewayClient, GatewayError, Inventory};
use crate::reconcile::{Action, ReconcileError, Reconciler, RestorationSource};
use crate::state::{now_epoch_secs, JsonFileStateStore, ReconciliationState, StateError, StateStore};
use crate::switch::summary::{RunSummary, StatusReport, Verdict};

/// Errors that abort a run. The gateway update is never partial, but after
/// `ApplyFailed` it may still have landed; re-running converges.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(#[from] ConfigError),

    #[error("application gateway not found: {0}")]
    GatewayNotFound(String),

    #[error("failed to read gateway: {0}")]
    Gateway(GatewayError),

    #[error(transparent)]
    NoRulesMatched(#[from] ReconcileError),

    #[error("gateway update did not complete: {0}")]
    ApplyFailed(GatewayError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl From<Vec<ValidationError>> for RunError {
    fn from(errors: Vec<ValidationError>) -> Self {
        RunError::ConfigInvalid(ConfigError::Validation(errors))
    }
}

fn fetch_error(err: GatewayError) -> RunError {
    match err {
        GatewayError::NotFound(id) => RunError::GatewayNotFound(id),
        other => RunError::Gateway(other),
    }
}

/// Runs one switch against one gateway client.
pub struct Runner<'a, C: GatewayClient> {
    client: &'a C,
    store: Option<&'a dyn StateStore>,
    dry_run: bool,
}

impl<'a, C: GatewayClient> Runner<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            store: None,
            dry_run: false,
        }
    }

    /// Use `store` instead of the JSON file named by the configuration.
    pub fn with_state_store(mut self, store: &'a dyn StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Plan and report without updating the gateway or the state file.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute a validated switch.
    pub async fn run(&self, resolved: &ResolvedSwitch) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "switch",
            run_id = %run_id,
            action = %resolved.request.action(),
            environment = %resolved.environment,
        );
        self.run_inner(run_id, resolved).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, resolved: &ResolvedSwitch) -> Result<RunSummary, RunError> {
        let gateway = self.client.identity();
        tracing::info!(gateway = %gateway, dry_run = self.dry_run, "Starting switch");

        let file_store;
        let store: Option<&dyn StateStore> = match resolved.restoration {
            RestorationMode::Config => None,
            RestorationMode::State => match (self.store, &resolved.state_path) {
                (Some(store), _) => Some(store),
                (None, Some(path)) => {
                    file_store = JsonFileStateStore::new(path);
                    Some(&file_store)
                }
                (None, None) => {
                    return Err(vec![ValidationError::StatePathRequired {
                        environment: resolved.environment.clone(),
                    }]
                    .into());
                }
            },
        };

        let inventory = self.client.fetch_inventory().await.map_err(fetch_error)?;

        let mut state = match store {
            Some(store) => Some(store.load(&gateway)?),
            None => None,
        };
        let empty = ReconciliationState::default();
        let now = now_epoch_secs();
        let reconciler = Reconciler::new(&inventory);

        let plan = match &resolved.request {
            SwitchRequest::Maintenance(spec) => reconciler.maintenance(spec, state.is_some(), now)?,
            SwitchRequest::Normal(spec) => reconciler.normal(RestorationSource::ConfigDeclared(spec))?,
            SwitchRequest::Restore { rules } => reconciler.normal(RestorationSource::StatePersisted {
                state: state.as_ref().unwrap_or(&empty),
                rules,
            })?,
        };

        // Captures are persisted before the update so a crash after it cannot lose them.
        if let (Some(store), Some(state)) = (store, state.as_mut()) {
            if !self.dry_run && !plan.captures.is_empty() {
                let added = state.record_captures(&plan.captures);
                state.mark_switch(Action::Maintenance, now);
                store.save(&gateway, state)?;
                tracing::info!(captured = added, "Recorded pre-maintenance targets");
            }
        }

        let applied = if plan.patch.is_empty() {
            tracing::info!("Gateway already in the desired state, nothing to apply");
            false
        } else if self.dry_run {
            tracing::info!(
                rules = plan.patch.rule_targets.len(),
                "Dry run, gateway left untouched"
            );
            false
        } else {
            self.client
                .apply_patch(&plan.patch)
                .await
                .map_err(RunError::ApplyFailed)?;
            true
        };

        if let (Some(store), Some(state)) = (store, state.as_mut()) {
            if !self.dry_run && plan.action == Action::Normal && !plan.restored.is_empty() {
                state.clear(&plan.restored);
                state.mark_switch(Action::Normal, now);
                store.save(&gateway, state)?;
            }
        }

        let summary = RunSummary::new(run_id, &resolved.environment, gateway, plan, applied, self.dry_run);
        match summary.verdict {
            Verdict::Success => tracing::info!(
                updated = summary.counts.updated,
                unchanged = summary.counts.unchanged,
                skipped = summary.counts.skipped,
                failed = summary.counts.failed,
                applied,
                "Switch complete"
            ),
            Verdict::PartialFailure => tracing::warn!(
                skipped = summary.counts.skipped,
                failed = summary.counts.failed,
                "No rule reached the desired state"
            ),
        }
        Ok(summary)
    }

    /// Report the current target of the environment's rules.
    pub async fn status(&self, resolved: &ResolvedSwitch) -> Result<StatusReport, RunError> {
        let inventory: Inventory = self.client.fetch_inventory().await.map_err(fetch_error)?;
        let rules = match &resolved.request {
            SwitchRequest::Maintenance(spec) => spec.rules.clone(),
            SwitchRequest::Normal(spec) => spec.rule_names(),
            SwitchRequest::Restore { rules } => rules.clone(),
        };
        Ok(StatusReport::new(
            &resolved.environment,
            self.client.identity(),
            &inventory,
            &rules,
        ))
    }
}
