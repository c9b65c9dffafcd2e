//! Rule reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! Action + MaintenanceSpec / RestorationSource
//!     + Inventory snapshot (from the gateway client)
//!     → planner.rs (rule lookup, target decisions, redirect reuse)
//!     → Plan { patch, outcomes, captures, restored }
//!     → runner applies patch in one upsert, persists captures
//! ```
//!
//! # Design Decisions
//! - Planning is pure and deterministic; same snapshot, same plan
//! - Current state equal to desired state is a no-op, never a mutation
//! - Per-rule problems are outcomes; only "nothing matched" is an error

pub mod desired;
pub mod outcome;
pub mod planner;
pub mod restoration;

pub use desired::{Action, MaintenanceSpec, NormalSpec, RestoreEntry};
pub use outcome::{Plan, RuleOutcome, RuleStatus};
pub use planner::{ReconcileError, Reconciler, MAINTENANCE_REDIRECT_NAME};
pub use restoration::{Restoration, RestorationSource};
