//! Application Gateway maintenance switch library.

pub mod config;
pub mod gateway;
pub mod observability;
pub mod reconcile;
pub mod resilience;
pub mod state;
pub mod switch;

pub use config::SwitchConfig;
pub use reconcile::{Action, Reconciler};
pub use switch::{RunError, RunSummary, Runner};
