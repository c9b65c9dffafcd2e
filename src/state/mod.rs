//! Persisted reconciliation state.
//!
//! # Data Flow
//! ```text
//! maintenance: planner captures pre-maintenance targets
//!     → ReconciliationState::record_captures (rules leaving a backend only)
//!     → StateStore::save (before the gateway update)
//!
//! normal: StateStore::load
//!     → RestorationSource::StatePersisted
//!     → ReconciliationState::clear (after the gateway update)
//! ```
//!
//! # Design Decisions
//! - Keyed by gateway identity so one file can serve several environments
//! - A missing file or record is an empty state, never an error
//! - No locking; callers serialize runs externally

pub mod store;

pub use store::{
    now_epoch_secs, CapturedTarget, JsonFileStateStore, ReconciliationState, StateError,
    StateStore,
};
