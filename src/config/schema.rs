//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the switch tool.
//! All types derive Serde traits for deserialization from TOML or JSON files.
//! JSON files exported by older tooling use camelCase keys, accepted via aliases.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SwitchConfig {
    /// Azure Resource Manager settings.
    pub azure: AzureConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Polling configuration for long-running gateway updates.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Default state store settings.
    pub state: StateConfig,

    /// Environment name -> routing rule configuration.
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

/// Azure Resource Manager settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Management endpoint (public cloud by default).
    #[serde(alias = "managementEndpoint")]
    pub management_endpoint: String,

    /// Microsoft.Network API version used for gateway reads and writes.
    #[serde(alias = "apiVersion")]
    pub api_version: String,

    /// Authority host for the client-credentials token flow.
    #[serde(alias = "authorityHost")]
    pub authority_host: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            management_endpoint: "https://management.azure.com".to_string(),
            api_version: "2023-09-01".to_string(),
            authority_host: "https://login.microsoftonline.com".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Single HTTP request timeout in seconds.
    pub request_secs: u64,

    /// Total time allowed for the gateway update operation in seconds.
    pub operation_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            // Gateway updates commonly take several minutes.
            operation_secs: 1200,
        }
    }
}

/// Backoff configuration for polling the gateway update.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Maximum number of status polls.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            max_attempts: 120,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// State store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the JSON state file.
    pub path: Option<PathBuf>,
}

/// Identity of an application gateway resource.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayRef {
    #[serde(alias = "subscriptionId")]
    pub subscription_id: String,

    #[serde(alias = "resourceGroup", alias = "resourceGroupName")]
    pub resource_group: String,

    #[serde(alias = "gatewayName", alias = "appGatewayName")]
    pub name: String,
}

impl GatewayRef {
    /// Key used to scope persisted state.
    pub fn identity(&self) -> String {
        format!("{}/{}/{}", self.subscription_id, self.resource_group, self.name)
    }
}

/// How Normal mode finds each rule's backend target.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestorationMode {
    /// Targets are declared in `normal_rules` (or the legacy combined form).
    #[default]
    Config,
    /// Targets are captured into the state file on entering maintenance.
    State,
}

/// One rule and the backend it routes to in normal mode.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RuleBinding {
    #[serde(alias = "ruleName", alias = "name")]
    pub rule: String,

    #[serde(alias = "backendPool", alias = "backendPoolName")]
    pub backend_pool: String,

    #[serde(default, alias = "backendSettings", alias = "backendSettingsName")]
    pub backend_settings: Option<String>,
}

/// Routing rule configuration for one environment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Target gateway.
    pub gateway: GatewayRef,

    /// Maintenance page URL.
    #[serde(alias = "redirectUrl", alias = "maintenanceUrl")]
    pub redirect_url: Option<String>,

    /// Restoration strategy for normal mode.
    pub restoration: RestorationMode,

    /// Rules moved to the maintenance redirect.
    #[serde(alias = "maintenanceRules")]
    pub maintenance_rules: Vec<String>,

    /// Rules and backends restored in normal mode.
    #[serde(alias = "normalRules")]
    pub normal_rules: Vec<RuleBinding>,

    /// Legacy combined form: rule names for maintenance and bindings for normal.
    #[serde(alias = "routingRulesToProcess")]
    pub routing_rules_to_process: Vec<RuleBinding>,

    /// Per-environment state file, overriding `[state].path`.
    #[serde(alias = "stateFile", alias = "statePath")]
    pub state_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SwitchConfig::default();
        assert_eq!(config.azure.management_endpoint, "https://management.azure.com");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.environments.is_empty());
    }

    #[test]
    fn test_parse_toml_environment() {
        let config: SwitchConfig = toml::from_str(
            r#"
            [environments.prod]
            redirect_url = "https://maint.example.com"
            maintenance_rules = ["rule-api", "rule-web"]

            [environments.prod.gateway]
            subscription_id = "0000"
            resource_group = "rg-web"
            name = "agw-prod"

            [[environments.prod.normal_rules]]
            rule = "rule-api"
            backend_pool = "api-pool"
            backend_settings = "api-settings"
            "#,
        )
        .unwrap();

        let prod = &config.environments["prod"];
        assert_eq!(prod.restoration, RestorationMode::Config);
        assert_eq!(prod.maintenance_rules, vec!["rule-api", "rule-web"]);
        assert_eq!(prod.normal_rules[0].backend_settings.as_deref(), Some("api-settings"));
        assert_eq!(prod.gateway.identity(), "0000/rg-web/agw-prod");
    }

    #[test]
    fn test_parse_legacy_json() {
        let config: SwitchConfig = serde_json::from_str(
            r#"{
                "environments": {
                    "test": {
                        "gateway": { "subscriptionId": "1111", "resourceGroupName": "rg", "appGatewayName": "agw" },
                        "redirectUrl": "https://maint.example.com",
                        "routingRulesToProcess": [
                            { "ruleName": "rule-api", "backendPoolName": "api-pool", "backendSettingsName": "api-settings" }
                        ]
                    }
                }
            }"#,
        )
        .unwrap();

        let test = &config.environments["test"];
        assert_eq!(test.gateway.name, "agw");
        assert_eq!(test.routing_rules_to_process[0].rule, "rule-api");
        assert_eq!(test.routing_rules_to_process[0].backend_pool, "api-pool");
    }
}
