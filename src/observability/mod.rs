//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields: rule, backend_pool, redirect, ...)
//!     → inside a per-run span (run_id, action, environment)
//!
//! Consumers:
//!     → stderr (operator terminal or pipeline log)
//! ```
//!
//! # Design Decisions
//! - Structured fields rather than formatted strings for rule names and targets
//! - Run ID (UUID v4) correlates every event of one invocation

pub mod logging;
