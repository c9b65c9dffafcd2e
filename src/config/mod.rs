//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (per environment + action semantic checks)
//!     → ResolvedSwitch (validated, immutable)
//!     → handed to the runner; nothing touches the gateway before this point
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; one load per run
//! - All tuning fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Legacy camelCase JSON keys are accepted through serde aliases

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{EnvironmentConfig, GatewayRef, RestorationMode, RuleBinding, SwitchConfig};
pub use validation::{
    resolve_switch, validate_config, Overrides, ResolvedSwitch, SwitchRequest, ValidationError,
};
