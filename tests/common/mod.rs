//! Shared fixtures for switch integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use appgw_switch::config::{parse_config, resolve_switch, Overrides, ResolvedSwitch};
use appgw_switch::gateway::arm::{apply_patch_to_document, inventory_from_document};
use appgw_switch::gateway::{GatewayClient, GatewayError, GatewayPatch, GatewayResult, Inventory};
use appgw_switch::Action;
use serde_json::{json, Value};

pub const GW: &str = "/subscriptions/0000/resourceGroups/rg-web/providers/Microsoft.Network/applicationGateways/agw-prod";

/// Gateway with `rule-api` and `rule-web` on their backends and an unrelated `rule-admin`.
pub fn gateway_document() -> Value {
    json!({
        "id": GW,
        "name": "agw-prod",
        "location": "westeurope",
        "properties": {
            "provisioningState": "Succeeded",
            "backendAddressPools": [
                { "name": "api-pool", "id": format!("{GW}/backendAddressPools/api-pool") },
                { "name": "web-pool", "id": format!("{GW}/backendAddressPools/web-pool") }
            ],
            "backendHttpSettingsCollection": [
                { "name": "api-settings", "id": format!("{GW}/backendHttpSettingsCollection/api-settings") },
                { "name": "web-settings", "id": format!("{GW}/backendHttpSettingsCollection/web-settings") }
            ],
            "requestRoutingRules": [
                rule("rule-api", "api-pool", "api-settings", 100),
                rule("rule-web", "web-pool", "web-settings", 200),
                rule("rule-admin", "web-pool", "web-settings", 300)
            ],
            "redirectConfigurations": []
        }
    })
}

fn rule(name: &str, pool: &str, settings: &str, priority: u32) -> Value {
    json!({
        "name": name,
        "id": format!("{GW}/requestRoutingRules/{name}"),
        "properties": {
            "ruleType": "Basic",
            "priority": priority,
            "httpListener": { "id": format!("{GW}/httpListeners/listener-{name}") },
            "backendAddressPool": { "id": format!("{GW}/backendAddressPools/{pool}") },
            "backendHttpSettings": { "id": format!("{GW}/backendHttpSettingsCollection/{settings}") }
        }
    })
}

/// In-memory gateway that records every update it receives.
pub struct MemoryGateway {
    document: Mutex<Value>,
    applies: AtomicU32,
}

#[allow(dead_code)]
impl MemoryGateway {
    pub fn new(document: Value) -> Self {
        Self {
            document: Mutex::new(document),
            applies: AtomicU32::new(0),
        }
    }

    pub fn apply_count(&self) -> u32 {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn document(&self) -> Value {
        self.document.lock().unwrap().clone()
    }

    pub fn inventory(&self) -> Inventory {
        inventory_from_document(&self.document()).unwrap()
    }
}

impl GatewayClient for MemoryGateway {
    fn identity(&self) -> String {
        "0000/rg-web/agw-prod".to_string()
    }

    async fn fetch_inventory(&self) -> GatewayResult<Inventory> {
        let document = self.document.lock().unwrap();
        inventory_from_document(&document)
    }

    async fn apply_patch(&self, patch: &GatewayPatch) -> GatewayResult<()> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        let mut document = self.document.lock().unwrap();
        apply_patch_to_document(&mut document, patch)
    }
}

/// Gateway that is missing or rejects a number of updates before accepting them.
pub struct FailingGateway {
    inner: MemoryGateway,
    missing: bool,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

#[allow(dead_code)]
impl FailingGateway {
    /// Every fetch answers "not found".
    pub fn missing() -> Self {
        Self {
            inner: MemoryGateway::new(gateway_document()),
            missing: true,
            failures_left: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    /// The first `failures` updates end in a failed provisioning state.
    pub fn rejecting(document: Value, failures: u32) -> Self {
        Self {
            inner: MemoryGateway::new(document),
            missing: false,
            failures_left: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn gateway(&self) -> &MemoryGateway {
        &self.inner
    }
}

impl GatewayClient for FailingGateway {
    fn identity(&self) -> String {
        self.inner.identity()
    }

    async fn fetch_inventory(&self) -> GatewayResult<Inventory> {
        if self.missing {
            return Err(GatewayError::NotFound(self.identity()));
        }
        self.inner.fetch_inventory().await
    }

    async fn apply_patch(&self, patch: &GatewayPatch) -> GatewayResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(GatewayError::OperationFailed("Failed".to_string()));
        }
        self.inner.apply_patch(patch).await
    }
}

/// Configuration with a config-declared `prod` and a state-restored `staging`.
#[allow(dead_code)]
pub const CONFIG: &str = r#"
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

[[environments.prod.normal_rules]]
rule = "rule-web"
backend_pool = "web-pool"
backend_settings = "web-settings"

[environments.staging]
redirect_url = "https://maint.example.com"
restoration = "state"
maintenance_rules = ["rule-api", "rule-web"]

[environments.staging.gateway]
subscription_id = "0000"
resource_group = "rg-web"
name = "agw-prod"
"#;

/// Resolve an environment from [`CONFIG`].
#[allow(dead_code)]
pub fn resolve(environment: &str, action: Action, overrides: &Overrides) -> ResolvedSwitch {
    let config = parse_config(CONFIG, false).unwrap();
    resolve_switch(&config, environment, action, overrides).unwrap()
}
