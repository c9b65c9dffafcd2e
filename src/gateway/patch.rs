//! Mutation set applied to a gateway in one upsert.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::gateway::inventory::{RedirectConfiguration, RuleTarget};

/// All changes for a single atomic gateway update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayPatch {
    /// Rule name -> new target.
    pub rule_targets: BTreeMap<String, RuleTarget>,
    /// Redirect configurations to create.
    pub added_redirects: Vec<RedirectConfiguration>,
    /// Redirect configurations to delete (by name).
    pub removed_redirects: Vec<String>,
}

impl GatewayPatch {
    /// True if applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.rule_targets.is_empty()
            && self.added_redirects.is_empty()
            && self.removed_redirects.is_empty()
    }
}
