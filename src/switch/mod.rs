//! Switch orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedSwitch (validated config)
//!     → runner.rs: GatewayClient::fetch_inventory
//!     → StateStore::load (state restoration only)
//!     → Reconciler (plan)
//!     → StateStore::save captures (maintenance, before the update)
//!     → GatewayClient::apply_patch (once, skipped if the patch is empty)
//!     → StateStore::save cleared records (normal, after the update)
//!     → summary.rs: RunSummary (text or JSON, exit code)
//! ```
//!
//! # Design Decisions
//! - One gateway update per run; partial application is never attempted
//! - Fatal errors abort before the update; per-rule problems end up in the summary
//! - Dry runs read everything and write nothing

pub mod runner;
pub mod summary;

pub use runner::{RunError, Runner};
pub use summary::{Counts, RuleState, RunSummary, StatusReport, Verdict};
