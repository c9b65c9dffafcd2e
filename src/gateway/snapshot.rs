//! Gateway client over an exported gateway document on disk.
//!
//! Works on the JSON printed by `az network application-gateway show`, so a
//! switch can be rehearsed offline and the result diffed before a real run.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::gateway::arm;
use crate::gateway::client::GatewayClient;
use crate::gateway::inventory::Inventory;
use crate::gateway::patch::GatewayPatch;
use crate::gateway::types::GatewayResult;

/// File-backed gateway client.
#[derive(Debug, Clone)]
pub struct SnapshotGatewayClient {
    path: PathBuf,
}

impl SnapshotGatewayClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> GatewayResult<Value> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl GatewayClient for SnapshotGatewayClient {
    fn identity(&self) -> String {
        format!("snapshot:{}", self.path.display())
    }

    async fn fetch_inventory(&self) -> GatewayResult<Inventory> {
        let document = self.read_document()?;
        let inventory = arm::inventory_from_document(&document)?;
        tracing::info!(
            path = %self.path.display(),
            rules = inventory.rules.len(),
            "Loaded gateway snapshot"
        );
        Ok(inventory)
    }

    async fn apply_patch(&self, patch: &GatewayPatch) -> GatewayResult<()> {
        let mut document = self.read_document()?;
        arm::apply_patch_to_document(&mut document, patch)?;
        fs::write(&self.path, serde_json::to_string_pretty(&document)?)?;
        tracing::info!(
            path = %self.path.display(),
            rules = patch.rule_targets.len(),
            "Wrote patched gateway snapshot"
        );
        Ok(())
    }
}
