//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Gateway update accepted (201/202 + Azure-AsyncOperation)
//!     → backoff.rs (delay before each status poll)
//!     → stop on Succeeded / Failed / Canceled, attempt cap or deadline
//! ```
//!
//! # Design Decisions
//! - No per-rule retries: a failed run is re-run as a whole
//! - Only status polling is repeated; the update itself is sent once
//! - Jittered backoff keeps polls off the management API's rate limits

pub mod backoff;
