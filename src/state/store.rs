//! Reconciliation state and its JSON file persistence.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::desired::Action;

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Seconds since the Unix epoch.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Backend target a rule had before it entered maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedTarget {
    /// `None` when the rule had no direct backend (e.g. path-based routing).
    pub backend_pool: Option<String>,
    pub backend_settings: Option<String>,
    /// Capture time (seconds since epoch).
    pub captured_at: u64,
}

/// Persisted restoration data for one gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationState {
    #[serde(default)]
    pub rules: BTreeMap<String, CapturedTarget>,
    #[serde(default)]
    pub last_switch: Option<u64>,
    #[serde(default)]
    pub last_action: Option<Action>,
}

impl ReconciliationState {
    pub fn captured(&self, rule: &str) -> Option<&CapturedTarget> {
        self.rules.get(rule)
    }

    /// Store captured targets, replacing older records for the same rules.
    ///
    /// Rules already in maintenance are never captured, so their record from
    /// before the first switch stays. Returns the number of records written.
    pub fn record_captures(&mut self, captures: &BTreeMap<String, CapturedTarget>) -> usize {
        for (rule, target) in captures {
            self.rules.insert(rule.clone(), target.clone());
        }
        captures.len()
    }

    /// Drop records for restored rules.
    pub fn clear(&mut self, rules: &[String]) {
        for rule in rules {
            self.rules.remove(rule);
        }
    }

    pub fn mark_switch(&mut self, action: Action, at: u64) {
        self.last_action = Some(action);
        self.last_switch = Some(at);
    }
}

/// Keyed store: gateway identity -> reconciliation state.
pub trait StateStore {
    /// Load state for a gateway; absence is an empty state.
    fn load(&self, gateway: &str) -> Result<ReconciliationState, StateError>;

    /// Replace the state for a gateway.
    fn save(&self, gateway: &str, state: &ReconciliationState) -> Result<(), StateError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    gateways: BTreeMap<String, ReconciliationState>,
}

/// State store backed by a single JSON file.
///
/// Not guarded against concurrent runs; the last writer wins.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<StateFile, StateError> {
        if !self.path.exists() {
            return Ok(StateFile::default());
        }
        let file = File::open(&self.path).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_file(&self, contents: &StateFile) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let file = File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, contents).map_err(|source| {
            StateError::Corrupt {
                path: tmp.clone(),
                source,
            }
        })?;
        writer.flush().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self, gateway: &str) -> Result<ReconciliationState, StateError> {
        let mut file = self.read_file()?;
        let state = file.gateways.remove(gateway).unwrap_or_default();
        tracing::debug!(
            path = %self.path.display(),
            gateway = %gateway,
            records = state.rules.len(),
            "Loaded reconciliation state"
        );
        Ok(state)
    }

    fn save(&self, gateway: &str, state: &ReconciliationState) -> Result<(), StateError> {
        let mut file = self.read_file()?;
        file.gateways.insert(gateway.to_string(), state.clone());
        self.write_file(&file)?;
        tracing::info!(
            path = %self.path.display(),
            gateway = %gateway,
            records = state.rules.len(),
            "Saved reconciliation state"
        );
        Ok(())
    }
}
