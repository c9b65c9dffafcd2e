//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Resolve one environment + action into typed switch inputs
//! - Expand the legacy `routing_rules_to_process` form
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before any gateway call is made
//! - Pure: `SwitchConfig` + inputs → `Result<ResolvedSwitch, Vec<ValidationError>>`

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::config::schema::{EnvironmentConfig, GatewayRef, RestorationMode, RuleBinding, SwitchConfig};
use crate::reconcile::{Action, MaintenanceSpec, NormalSpec, RestoreEntry};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),

    #[error("environment '{environment}': missing {field}")]
    MissingField { environment: String, field: String },

    #[error("environment '{environment}': empty rule name")]
    EmptyRuleName { environment: String },

    #[error("environment '{environment}': rule '{rule}' has no backend pool")]
    EmptyBackendPool { environment: String, rule: String },

    #[error("environment '{environment}': rule '{rule}' listed more than once")]
    DuplicateRule { environment: String, rule: String },

    #[error("environment '{environment}': invalid redirect URL '{url}': {reason}")]
    InvalidRedirectUrl {
        environment: String,
        url: String,
        reason: String,
    },

    #[error("environment '{environment}': routing_rules_to_process cannot be combined with maintenance_rules/normal_rules")]
    ConflictingRuleForms { environment: String },

    #[error("environment '{environment}': state restoration needs a state file path")]
    StatePathRequired { environment: String },
}

/// Run parameters that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub redirect_url: Option<String>,
    pub state_path: Option<PathBuf>,
}

/// What a switch run has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchRequest {
    Maintenance(MaintenanceSpec),
    /// Restore to backends declared in configuration.
    Normal(NormalSpec),
    /// Restore the named rules from captured state.
    Restore { rules: Vec<String> },
}

impl SwitchRequest {
    pub fn action(&self) -> Action {
        match self {
            SwitchRequest::Maintenance(_) => Action::Maintenance,
            SwitchRequest::Normal(_) | SwitchRequest::Restore { .. } => Action::Normal,
        }
    }
}

/// Validated inputs for one switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSwitch {
    pub environment: String,
    pub gateway: GatewayRef,
    pub restoration: RestorationMode,
    pub request: SwitchRequest,
    /// Set when restoration uses the state file.
    pub state_path: Option<PathBuf>,
}

/// Resolve one environment for `action`, reporting every problem found.
pub fn resolve_switch(
    config: &SwitchConfig,
    environment: &str,
    action: Action,
    overrides: &Overrides,
) -> Result<ResolvedSwitch, Vec<ValidationError>> {
    let env = config
        .environments
        .get(environment)
        .ok_or_else(|| vec![ValidationError::UnknownEnvironment(environment.to_string())])?;

    let mut errors = Vec::new();
    check_gateway(environment, &env.gateway, &mut errors);

    let explicit = !env.maintenance_rules.is_empty() || !env.normal_rules.is_empty();
    if explicit && !env.routing_rules_to_process.is_empty() {
        errors.push(ValidationError::ConflictingRuleForms {
            environment: environment.to_string(),
        });
    }

    let state_path = match env.restoration {
        RestorationMode::State => {
            let path = overrides
                .state_path
                .clone()
                .or_else(|| env.state_path.clone())
                .or_else(|| config.state.path.clone());
            if path.is_none() {
                errors.push(ValidationError::StatePathRequired {
                    environment: environment.to_string(),
                });
            }
            path
        }
        RestorationMode::Config => None,
    };

    let request = match (action, env.restoration) {
        (Action::Maintenance, _) => {
            let rules = maintenance_rules(environment, env, &mut errors);
            let redirect_url = redirect_url(environment, env, overrides, &mut errors);
            SwitchRequest::Maintenance(MaintenanceSpec {
                rules,
                redirect_url: redirect_url.unwrap_or_default(),
            })
        }
        (Action::Normal, RestorationMode::Config) => {
            SwitchRequest::Normal(normal_spec(environment, env, &mut errors))
        }
        (Action::Normal, RestorationMode::State) => SwitchRequest::Restore {
            rules: maintenance_rules(environment, env, &mut errors),
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ResolvedSwitch {
        environment: environment.to_string(),
        gateway: env.gateway.clone(),
        restoration: env.restoration,
        request,
        state_path,
    })
}

/// Validate every environment for both actions.
pub fn validate_config(config: &SwitchConfig, overrides: &Overrides) -> Result<(), Vec<ValidationError>> {
    let mut errors: Vec<ValidationError> = Vec::new();
    for name in config.environments.keys() {
        for action in [Action::Maintenance, Action::Normal] {
            if let Err(found) = resolve_switch(config, name, action, overrides) {
                for error in found {
                    if !errors.contains(&error) {
                        errors.push(error);
                    }
                }
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn missing(environment: &str, field: &str) -> ValidationError {
    ValidationError::MissingField {
        environment: environment.to_string(),
        field: field.to_string(),
    }
}

fn check_gateway(environment: &str, gateway: &GatewayRef, errors: &mut Vec<ValidationError>) {
    for (field, value) in [
        ("gateway.subscription_id", &gateway.subscription_id),
        ("gateway.resource_group", &gateway.resource_group),
        ("gateway.name", &gateway.name),
    ] {
        if value.trim().is_empty() {
            errors.push(missing(environment, field));
        }
    }
}

fn check_rule_names<'a>(
    environment: &str,
    names: impl Iterator<Item = &'a str>,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen = BTreeSet::new();
    for name in names {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyRuleName {
                environment: environment.to_string(),
            });
        } else if !seen.insert(name) {
            errors.push(ValidationError::DuplicateRule {
                environment: environment.to_string(),
                rule: name.to_string(),
            });
        }
    }
}

fn maintenance_rules(
    environment: &str,
    env: &EnvironmentConfig,
    errors: &mut Vec<ValidationError>,
) -> Vec<String> {
    let rules: Vec<String> = if env.routing_rules_to_process.is_empty() {
        env.maintenance_rules.clone()
    } else {
        env.routing_rules_to_process
            .iter()
            .map(|b| b.rule.clone())
            .collect()
    };

    if rules.is_empty() {
        errors.push(missing(environment, "maintenance_rules"));
    }
    check_rule_names(environment, rules.iter().map(String::as_str), errors);
    rules
}

fn normal_spec(
    environment: &str,
    env: &EnvironmentConfig,
    errors: &mut Vec<ValidationError>,
) -> NormalSpec {
    let bindings: &[RuleBinding] = if env.routing_rules_to_process.is_empty() {
        &env.normal_rules
    } else {
        &env.routing_rules_to_process
    };

    if bindings.is_empty() {
        errors.push(missing(environment, "normal_rules"));
    }
    check_rule_names(environment, bindings.iter().map(|b| b.rule.as_str()), errors);

    let entries = bindings
        .iter()
        .map(|binding| {
            if binding.backend_pool.trim().is_empty() && !binding.rule.trim().is_empty() {
                errors.push(ValidationError::EmptyBackendPool {
                    environment: environment.to_string(),
                    rule: binding.rule.clone(),
                });
            }
            RestoreEntry::new(
                binding.rule.clone(),
                binding.backend_pool.clone(),
                binding
                    .backend_settings
                    .as_deref()
                    .filter(|s| !s.trim().is_empty()),
            )
        })
        .collect();

    NormalSpec { entries }
}

fn redirect_url(
    environment: &str,
    env: &EnvironmentConfig,
    overrides: &Overrides,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    let Some(raw) = overrides
        .redirect_url
        .clone()
        .or_else(|| env.redirect_url.clone())
        .filter(|u| !u.trim().is_empty())
    else {
        errors.push(missing(environment, "redirect_url"));
        return None;
    };

    let invalid = |reason: &str| ValidationError::InvalidRedirectUrl {
        environment: environment.to_string(),
        url: raw.clone(),
        reason: reason.to_string(),
    };

    match Url::parse(&raw) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.push(invalid("scheme must be http or https"));
            None
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(invalid("missing host"));
            None
        }
        Ok(_) => Some(raw),
        Err(e) => {
            errors.push(invalid(&e.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GatewayRef {
        GatewayRef {
            subscription_id: "0000".into(),
            resource_group: "rg-web".into(),
            name: "agw-prod".into(),
        }
    }

    fn binding(rule: &str, pool: &str, settings: Option<&str>) -> RuleBinding {
        RuleBinding {
            rule: rule.into(),
            backend_pool: pool.into(),
            backend_settings: settings.map(str::to_string),
        }
    }

    fn config_with(env: EnvironmentConfig) -> SwitchConfig {
        let mut config = SwitchConfig::default();
        config.environments.insert("prod".into(), env);
        config
    }

    fn prod() -> EnvironmentConfig {
        EnvironmentConfig {
            gateway: gateway(),
            redirect_url: Some("https://maint.example.com".into()),
            maintenance_rules: vec!["rule-api".into(), "rule-web".into()],
            normal_rules: vec![
                binding("rule-api", "api-pool", Some("api-settings")),
                binding("rule-web", "web-pool", Some("")),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_maintenance() {
        let resolved =
            resolve_switch(&config_with(prod()), "prod", Action::Maintenance, &Overrides::default())
                .unwrap();
        let SwitchRequest::Maintenance(spec) = resolved.request else {
            panic!("expected maintenance request");
        };
        assert_eq!(spec.rules, vec!["rule-api", "rule-web"]);
        assert_eq!(spec.redirect_url, "https://maint.example.com");
        assert_eq!(resolved.state_path, None);
    }

    #[test]
    fn test_redirect_override_wins() {
        let overrides = Overrides {
            redirect_url: Some("https://other.example.com/down".into()),
            ..Default::default()
        };
        let resolved =
            resolve_switch(&config_with(prod()), "prod", Action::Maintenance, &overrides).unwrap();
        let SwitchRequest::Maintenance(spec) = resolved.request else {
            panic!("expected maintenance request");
        };
        assert_eq!(spec.redirect_url, "https://other.example.com/down");
    }

    #[test]
    fn test_resolve_normal_drops_empty_settings() {
        let resolved =
            resolve_switch(&config_with(prod()), "prod", Action::Normal, &Overrides::default())
                .unwrap();
        let SwitchRequest::Normal(spec) = resolved.request else {
            panic!("expected normal request");
        };
        assert_eq!(spec.entries[0].backend_settings.as_deref(), Some("api-settings"));
        assert_eq!(spec.entries[1].backend_settings, None);
    }

    #[test]
    fn test_legacy_form_feeds_both_actions() {
        let env = EnvironmentConfig {
            gateway: gateway(),
            redirect_url: Some("https://maint.example.com".into()),
            routing_rules_to_process: vec![binding("rule-api", "api-pool", Some("api-settings"))],
            ..Default::default()
        };
        let config = config_with(env);

        let maintenance =
            resolve_switch(&config, "prod", Action::Maintenance, &Overrides::default()).unwrap();
        assert_eq!(
            maintenance.request,
            SwitchRequest::Maintenance(MaintenanceSpec {
                rules: vec!["rule-api".into()],
                redirect_url: "https://maint.example.com".into(),
            })
        );

        let normal = resolve_switch(&config, "prod", Action::Normal, &Overrides::default()).unwrap();
        assert_eq!(
            normal.request,
            SwitchRequest::Normal(NormalSpec {
                entries: vec![RestoreEntry::new("rule-api", "api-pool", Some("api-settings"))],
            })
        );
    }

    #[test]
    fn test_reports_all_errors() {
        let env = EnvironmentConfig {
            redirect_url: Some("ftp://maint.example.com".into()),
            maintenance_rules: vec!["rule-api".into(), "rule-api".into(), " ".into()],
            routing_rules_to_process: vec![binding("rule-x", "pool", None)],
            ..Default::default()
        };
        let errors = resolve_switch(&config_with(env), "prod", Action::Maintenance, &Overrides::default())
            .unwrap_err();

        assert!(errors.contains(&missing("prod", "gateway.subscription_id")));
        assert!(errors.contains(&missing("prod", "gateway.name")));
        assert!(errors.contains(&ValidationError::ConflictingRuleForms {
            environment: "prod".into()
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidRedirectUrl { .. })));
    }

    #[test]
    fn test_state_mode_requires_path() {
        let env = EnvironmentConfig {
            restoration: RestorationMode::State,
            ..prod()
        };
        let errors = resolve_switch(&config_with(env.clone()), "prod", Action::Normal, &Overrides::default())
            .unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::StatePathRequired {
                environment: "prod".into()
            }]
        );

        let overrides = Overrides {
            state_path: Some("state.json".into()),
            ..Default::default()
        };
        let resolved = resolve_switch(&config_with(env), "prod", Action::Normal, &overrides).unwrap();
        assert_eq!(
            resolved.request,
            SwitchRequest::Restore {
                rules: vec!["rule-api".into(), "rule-web".into()]
            }
        );
        assert_eq!(resolved.state_path, Some(PathBuf::from("state.json")));
    }

    #[test]
    fn test_unknown_environment() {
        let errors = resolve_switch(&config_with(prod()), "staging", Action::Normal, &Overrides::default())
            .unwrap_err();
        assert_eq!(errors, vec![ValidationError::UnknownEnvironment("staging".into())]);
    }

    #[test]
    fn test_validate_config_deduplicates() {
        let env = EnvironmentConfig {
            gateway: GatewayRef::default(),
            ..prod()
        };
        let errors = validate_config(&config_with(env), &Overrides::default()).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
