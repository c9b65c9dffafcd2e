//! Desired-state inputs for a switch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which mode the rules should end up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Maintenance,
    Normal,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Maintenance => write!(f, "maintenance"),
            Action::Normal => write!(f, "normal"),
        }
    }
}

/// Rules to redirect and where to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceSpec {
    pub rules: Vec<String>,
    pub redirect_url: String,
}

/// Backend a rule is restored to in normal mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreEntry {
    pub rule: String,
    pub backend_pool: String,
    pub backend_settings: Option<String>,
}

impl RestoreEntry {
    pub fn new(
        rule: impl Into<String>,
        backend_pool: impl Into<String>,
        backend_settings: Option<&str>,
    ) -> Self {
        Self {
            rule: rule.into(),
            backend_pool: backend_pool.into(),
            backend_settings: backend_settings.map(str::to_string),
        }
    }
}

/// Declared restoration targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalSpec {
    pub entries: Vec<RestoreEntry>,
}

impl NormalSpec {
    pub fn rule_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.rule.clone()).collect()
    }
}
