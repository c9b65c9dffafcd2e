//! Mapping between ARM application gateway documents and the inventory model.
//!
//! # Responsibilities
//! - Read rules, pools, settings and redirect configurations from a gateway document
//! - Write a `GatewayPatch` back into the same document before the upsert
//!
//! # Design Decisions
//! - The whole document is preserved; only the touched sub-resources change
//! - Sub-resource references are ARM ids; the last path segment is the name
//! - Redirect back-references are recomputed from the patched rules

use serde_json::{json, Map, Value};

use crate::gateway::inventory::{
    BackendPool, BackendSettings, Inventory, RedirectConfiguration, RedirectType, RoutingRule,
    RuleTarget,
};
use crate::gateway::patch::GatewayPatch;
use crate::gateway::types::{GatewayError, GatewayResult};

const RULES: &str = "requestRoutingRules";
const POOLS: &str = "backendAddressPools";
const SETTINGS: &str = "backendHttpSettingsCollection";
const REDIRECTS: &str = "redirectConfigurations";

/// Build an inventory from a gateway document.
pub fn inventory_from_document(doc: &Value) -> GatewayResult<Inventory> {
    let properties = properties(doc)?;

    let rules = collection(properties, RULES)
        .iter()
        .map(|item| {
            Ok(RoutingRule {
                name: name_of(item)?,
                target: rule_target(item),
            })
        })
        .collect::<GatewayResult<Vec<_>>>()?;

    let backend_pools = collection(properties, POOLS)
        .iter()
        .map(|item| Ok(BackendPool { name: name_of(item)? }))
        .collect::<GatewayResult<Vec<_>>>()?;

    let backend_settings = collection(properties, SETTINGS)
        .iter()
        .map(|item| Ok(BackendSettings { name: name_of(item)? }))
        .collect::<GatewayResult<Vec<_>>>()?;

    let redirects = collection(properties, REDIRECTS)
        .iter()
        .map(redirect_configuration)
        .collect::<GatewayResult<Vec<_>>>()?;

    Ok(Inventory {
        rules,
        backend_pools,
        backend_settings,
        redirects,
    })
}

/// Write `patch` into `doc` in place.
pub fn apply_patch_to_document(doc: &mut Value, patch: &GatewayPatch) -> GatewayResult<()> {
    let gateway_id = doc
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Document("gateway has no id".into()))?
        .to_string();

    let properties = doc
        .get_mut("properties")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| GatewayError::Document("gateway has no properties".into()))?;

    // Redirects first so that rules can reference newly added ones.
    {
        let redirects = collection_mut(properties, REDIRECTS)?;
        redirects.retain(|item| {
            item.get("name")
                .and_then(Value::as_str)
                .map(|name| !patch.removed_redirects.iter().any(|r| r == name))
                .unwrap_or(true)
        });
        for redirect in &patch.added_redirects {
            redirects.push(redirect_document(&gateway_id, redirect));
        }
    }

    {
        let rules = collection_mut(properties, RULES)?;
        for (rule_name, target) in &patch.rule_targets {
            let rule = rules
                .iter_mut()
                .find(|item| item.get("name").and_then(Value::as_str) == Some(rule_name.as_str()))
                .ok_or_else(|| {
                    GatewayError::Document(format!("routing rule '{}' not in document", rule_name))
                })?;
            set_rule_target(&gateway_id, rule, target)?;
        }
    }

    relink_redirects(&gateway_id, properties)?;
    Ok(())
}

fn properties(doc: &Value) -> GatewayResult<&Map<String, Value>> {
    doc.get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| GatewayError::Document("gateway has no properties".into()))
}

fn collection<'a>(properties: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    properties
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn collection_mut<'a>(
    properties: &'a mut Map<String, Value>,
    key: &str,
) -> GatewayResult<&'a mut Vec<Value>> {
    properties
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| GatewayError::Document(format!("'{}' is not an array", key)))
}

fn name_of(item: &Value) -> GatewayResult<String> {
    item.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Document("sub-resource without a name".into()))
}

/// Name referenced by `properties.<field>.id`, if present.
fn reference(item: &Value, field: &str) -> Option<String> {
    item.get("properties")?
        .get(field)?
        .get("id")?
        .as_str()
        .and_then(last_segment)
}

fn last_segment(id: &str) -> Option<String> {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn rule_target(item: &Value) -> RuleTarget {
    if let Some(configuration) = reference(item, "redirectConfiguration") {
        return RuleTarget::Redirect { configuration };
    }
    match reference(item, "backendAddressPool") {
        Some(pool) => RuleTarget::Backend {
            pool,
            settings: reference(item, "backendHttpSettings"),
        },
        None => RuleTarget::Unset,
    }
}

fn redirect_configuration(item: &Value) -> GatewayResult<RedirectConfiguration> {
    let name = name_of(item)?;
    let props = item.get("properties");
    let field = |key: &str| props.and_then(|p| p.get(key));

    let redirect_type = field("redirectType")
        .and_then(Value::as_str)
        .and_then(RedirectType::from_arm)
        .unwrap_or(RedirectType::Permanent);

    let used_by_path_maps = ["urlPathMaps", "pathRules"].iter().any(|key| {
        field(key)
            .and_then(Value::as_array)
            .map(|refs| !refs.is_empty())
            .unwrap_or(false)
    });

    Ok(RedirectConfiguration {
        name,
        redirect_type,
        target_url: field("targetUrl").and_then(Value::as_str).map(str::to_string),
        include_path: field("includePath").and_then(Value::as_bool).unwrap_or(false),
        include_query_string: field("includeQueryString")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        used_by_path_maps,
    })
}

fn child_id(gateway_id: &str, collection: &str, name: &str) -> Value {
    json!({ "id": format!("{}/{}/{}", gateway_id, collection, name) })
}

fn redirect_document(gateway_id: &str, redirect: &RedirectConfiguration) -> Value {
    let mut properties = json!({
        "redirectType": redirect.redirect_type.as_arm(),
        "includePath": redirect.include_path,
        "includeQueryString": redirect.include_query_string,
        "requestRoutingRules": [],
    });
    if let Some(url) = &redirect.target_url {
        properties["targetUrl"] = Value::String(url.clone());
    }
    json!({
        "name": redirect.name,
        "id": format!("{}/{}/{}", gateway_id, REDIRECTS, redirect.name),
        "properties": properties,
    })
}

fn set_rule_target(gateway_id: &str, rule: &mut Value, target: &RuleTarget) -> GatewayResult<()> {
    let props = rule
        .as_object_mut()
        .ok_or_else(|| GatewayError::Document("routing rule is not an object".into()))?
        .entry("properties".to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| GatewayError::Document("routing rule properties is not an object".into()))?;

    for key in [
        "backendAddressPool",
        "backendHttpSettings",
        "redirectConfiguration",
        "urlPathMap",
    ] {
        props.remove(key);
    }

    match target {
        RuleTarget::Backend { pool, settings } => {
            props.insert("backendAddressPool".into(), child_id(gateway_id, POOLS, pool));
            if let Some(settings) = settings {
                props.insert(
                    "backendHttpSettings".into(),
                    child_id(gateway_id, SETTINGS, settings),
                );
            }
        }
        RuleTarget::Redirect { configuration } => {
            props.insert(
                "redirectConfiguration".into(),
                child_id(gateway_id, REDIRECTS, configuration),
            );
        }
        RuleTarget::Unset => {}
    }
    props.insert("ruleType".into(), Value::String("Basic".into()));
    Ok(())
}

/// Recompute each redirect configuration's `requestRoutingRules` back-references.
fn relink_redirects(gateway_id: &str, properties: &mut Map<String, Value>) -> GatewayResult<()> {
    let links: Vec<(String, String)> = collection(properties, RULES)
        .iter()
        .filter_map(|rule| {
            let redirect = reference(rule, "redirectConfiguration")?;
            let rule_name = rule.get("name")?.as_str()?;
            Some((redirect, rule_name.to_string()))
        })
        .collect();

    for redirect in collection_mut(properties, REDIRECTS)? {
        let Some(name) = redirect.get("name").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        let rule_refs: Vec<Value> = links
            .iter()
            .filter(|(target, _)| *target == name)
            .map(|(_, rule)| child_id(gateway_id, RULES, rule))
            .collect();
        if let Some(props) = redirect.get_mut("properties").and_then(Value::as_object_mut) {
            props.insert("requestRoutingRules".into(), Value::Array(rule_refs));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GW: &str = "/subscriptions/0000/resourceGroups/rg-web/providers/Microsoft.Network/applicationGateways/agw-prod";

    fn document() -> Value {
        json!({
            "id": GW,
            "name": "agw-prod",
            "etag": "W/\"1\"",
            "properties": {
                "provisioningState": "Succeeded",
                "backendAddressPools": [
                    { "name": "api-pool", "id": format!("{GW}/backendAddressPools/api-pool") },
                    { "name": "web-pool", "id": format!("{GW}/backendAddressPools/web-pool") }
                ],
                "backendHttpSettingsCollection": [
                    { "name": "api-settings", "id": format!("{GW}/backendHttpSettingsCollection/api-settings") }
                ],
                "requestRoutingRules": [
                    {
                        "name": "rule-api",
                        "properties": {
                            "ruleType": "Basic",
                            "priority": 100,
                            "httpListener": { "id": format!("{GW}/httpListeners/listener-api") },
                            "backendAddressPool": { "id": format!("{GW}/backendAddressPools/api-pool") },
                            "backendHttpSettings": { "id": format!("{GW}/backendHttpSettingsCollection/api-settings") }
                        }
                    },
                    {
                        "name": "rule-paths",
                        "properties": {
                            "ruleType": "PathBasedRouting",
                            "urlPathMap": { "id": format!("{GW}/urlPathMaps/paths") }
                        }
                    }
                ],
                "redirectConfigurations": [
                    {
                        "name": "legacy-redirect",
                        "properties": {
                            "redirectType": "Found",
                            "targetUrl": "https://old.example.com",
                            "urlPathMaps": [ { "id": format!("{GW}/urlPathMaps/paths") } ]
                        }
                    }
                ]
            }
        })
    }

    #[test]
    fn test_inventory_from_document() {
        let inventory = inventory_from_document(&document()).unwrap();

        assert_eq!(inventory.rules.len(), 2);
        assert_eq!(
            inventory.rule("rule-api").unwrap().target,
            RuleTarget::backend("api-pool", Some("api-settings".into()))
        );
        assert_eq!(inventory.rule("rule-paths").unwrap().target, RuleTarget::Unset);
        assert!(inventory.has_pool("web-pool"));
        assert!(inventory.has_settings("api-settings"));

        let legacy = inventory.redirect("legacy-redirect").unwrap();
        assert_eq!(legacy.redirect_type, RedirectType::Found);
        assert!(legacy.used_by_path_maps);
    }

    #[test]
    fn test_patch_writes_redirect_and_keeps_other_fields() {
        let mut doc = document();
        let mut patch = GatewayPatch::default();
        patch
            .rule_targets
            .insert("rule-api".into(), RuleTarget::redirect("maintenance-redirect"));
        patch.added_redirects.push(RedirectConfiguration::maintenance(
            "maintenance-redirect",
            "https://maint.example.com",
        ));

        apply_patch_to_document(&mut doc, &patch).unwrap();

        let rule = &doc["properties"]["requestRoutingRules"][0]["properties"];
        assert!(rule.get("backendAddressPool").is_none());
        assert!(rule.get("backendHttpSettings").is_none());
        assert_eq!(
            rule["redirectConfiguration"]["id"],
            format!("{GW}/redirectConfigurations/maintenance-redirect")
        );
        assert_eq!(rule["priority"], 100);
        assert_eq!(
            rule["httpListener"]["id"],
            format!("{GW}/httpListeners/listener-api")
        );

        let redirect = &doc["properties"]["redirectConfigurations"][1];
        assert_eq!(redirect["properties"]["redirectType"], "Permanent");
        assert_eq!(redirect["properties"]["targetUrl"], "https://maint.example.com");
        assert_eq!(
            redirect["properties"]["requestRoutingRules"][0]["id"],
            format!("{GW}/requestRoutingRules/rule-api")
        );

        let reread = inventory_from_document(&doc).unwrap();
        assert_eq!(
            reread.rule("rule-api").unwrap().target,
            RuleTarget::redirect("maintenance-redirect")
        );
    }

    #[test]
    fn test_patch_restores_backend_and_removes_redirect() {
        let mut doc = document();
        let mut to_maintenance = GatewayPatch::default();
        to_maintenance
            .rule_targets
            .insert("rule-api".into(), RuleTarget::redirect("maintenance-redirect"));
        to_maintenance.added_redirects.push(RedirectConfiguration::maintenance(
            "maintenance-redirect",
            "https://maint.example.com",
        ));
        apply_patch_to_document(&mut doc, &to_maintenance).unwrap();

        let mut to_normal = GatewayPatch::default();
        to_normal.rule_targets.insert(
            "rule-api".into(),
            RuleTarget::backend("api-pool", Some("api-settings".into())),
        );
        to_normal.removed_redirects.push("maintenance-redirect".into());
        apply_patch_to_document(&mut doc, &to_normal).unwrap();

        let inventory = inventory_from_document(&doc).unwrap();
        assert_eq!(
            inventory.rule("rule-api").unwrap().target,
            RuleTarget::backend("api-pool", Some("api-settings".into()))
        );
        assert!(inventory.redirect("maintenance-redirect").is_none());
        assert!(inventory.redirect("legacy-redirect").is_some());
    }

    #[test]
    fn test_patch_unknown_rule_is_rejected() {
        let mut doc = document();
        let mut patch = GatewayPatch::default();
        patch
            .rule_targets
            .insert("rule-missing".into(), RuleTarget::backend("api-pool", None));

        let err = apply_patch_to_document(&mut doc, &patch).unwrap_err();
        assert!(matches!(err, GatewayError::Document(_)));
    }

    #[test]
    fn test_document_without_properties() {
        let err = inventory_from_document(&json!({ "id": GW })).unwrap_err();
        assert!(matches!(err, GatewayError::Document(_)));
    }
}
