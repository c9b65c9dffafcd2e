//! Gateway access subsystem.
//!
//! # Data Flow
//! ```text
//! Credentials (environment variables)
//!     → credential.rs (bearer token)
//!     → azure.rs (GET gateway document)   or   snapshot.rs (read exported document)
//!     → arm.rs (document → Inventory)
//!     ... reconciler plans a GatewayPatch ...
//!     → arm.rs (GatewayPatch → document)
//!     → azure.rs (single PUT + poll)      or   snapshot.rs (write document)
//! ```
//!
//! # Security Constraints
//! - Secrets ONLY from environment variables
//! - Never log tokens or client secrets
//! - All management API calls have timeouts

pub mod arm;
pub mod azure;
pub mod client;
pub mod credential;
pub mod inventory;
pub mod patch;
pub mod snapshot;
pub mod types;

pub use azure::AzureGatewayClient;
pub use client::GatewayClient;
pub use credential::Credential;
pub use inventory::{
    BackendPool, BackendSettings, Inventory, RedirectConfiguration, RedirectType, RoutingRule,
    RuleTarget,
};
pub use patch::GatewayPatch;
pub use snapshot::SnapshotGatewayClient;
pub use types::{GatewayError, GatewayRef, GatewayResult};
