//! Gateway client abstraction.
//!
//! The runner only talks to a gateway through this trait: one read of the
//! whole inventory and at most one write of a batched patch.

use std::future::Future;

use crate::gateway::inventory::Inventory;
use crate::gateway::patch::GatewayPatch;
use crate::gateway::types::GatewayResult;

/// Source of truth for current gateway state and sink for mutations.
pub trait GatewayClient: Send + Sync {
    /// Stable key for the gateway (used to scope persisted state).
    fn identity(&self) -> String;

    /// Fetch the live inventory.
    fn fetch_inventory(&self) -> impl Future<Output = GatewayResult<Inventory>> + Send;

    /// Apply all mutations in one upsert of the gateway configuration.
    fn apply_patch(&self, patch: &GatewayPatch) -> impl Future<Output = GatewayResult<()>> + Send;
}
