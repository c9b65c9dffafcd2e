//! Inventory snapshot of a gateway.
//!
//! # Responsibilities
//! - Represent rules, backend pools, backend settings and redirect configurations
//! - Answer name lookups for the reconciler
//! - Apply a `GatewayPatch` to produce a new snapshot (no in-place mutation)
//!
//! # Design Decisions
//! - Everything is addressed by name; resource ids are an ARM concern
//! - A rule has exactly one target kind at a time (enforced by `RuleTarget`)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gateway::patch::GatewayPatch;

/// Where a routing rule currently sends its traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleTarget {
    /// Forward to a backend pool, optionally with named backend settings.
    Backend {
        pool: String,
        settings: Option<String>,
    },
    /// Answer with the redirect described by a redirect configuration.
    Redirect { configuration: String },
    /// Neither (e.g. path-based rules routed through a URL path map).
    Unset,
}

impl RuleTarget {
    /// Backend target helper.
    pub fn backend(pool: impl Into<String>, settings: Option<String>) -> Self {
        RuleTarget::Backend {
            pool: pool.into(),
            settings,
        }
    }

    /// Redirect target helper.
    pub fn redirect(configuration: impl Into<String>) -> Self {
        RuleTarget::Redirect {
            configuration: configuration.into(),
        }
    }

    /// Name of the redirect configuration, if this is a redirect target.
    pub fn redirect_configuration(&self) -> Option<&str> {
        match self {
            RuleTarget::Redirect { configuration } => Some(configuration),
            _ => None,
        }
    }

    /// Short label used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleTarget::Backend { .. } => "backend",
            RuleTarget::Redirect { .. } => "redirect",
            RuleTarget::Unset => "unset",
        }
    }
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Backend {
                pool,
                settings: Some(settings),
            } => write!(f, "backend {} ({})", pool, settings),
            RuleTarget::Backend {
                pool,
                settings: None,
            } => write!(f, "backend {}", pool),
            RuleTarget::Redirect { configuration } => write!(f, "redirect {}", configuration),
            RuleTarget::Unset => write!(f, "unset"),
        }
    }
}

/// A named request-routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    pub target: RuleTarget,
}

/// A named backend address pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPool {
    pub name: String,
}

/// Named protocol/port settings paired with a pool assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub name: String,
}

/// HTTP semantics of a redirect configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectType {
    Permanent,
    Found,
    SeeOther,
    Temporary,
}

impl RedirectType {
    /// Parse the ARM representation.
    pub fn from_arm(value: &str) -> Option<Self> {
        match value {
            "Permanent" => Some(RedirectType::Permanent),
            "Found" => Some(RedirectType::Found),
            "SeeOther" => Some(RedirectType::SeeOther),
            "Temporary" => Some(RedirectType::Temporary),
            _ => None,
        }
    }

    /// ARM representation.
    pub fn as_arm(&self) -> &'static str {
        match self {
            RedirectType::Permanent => "Permanent",
            RedirectType::Found => "Found",
            RedirectType::SeeOther => "SeeOther",
            RedirectType::Temporary => "Temporary",
        }
    }
}

/// A redirect configuration on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectConfiguration {
    pub name: String,
    pub redirect_type: RedirectType,
    /// External URL; `None` for listener-targeted redirects.
    pub target_url: Option<String>,
    pub include_path: bool,
    pub include_query_string: bool,
    /// Still referenced by URL path maps, which this tool never edits.
    #[serde(default)]
    pub used_by_path_maps: bool,
}

impl RedirectConfiguration {
    /// A permanent external redirect that drops path and query string.
    pub fn maintenance(name: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            redirect_type: RedirectType::Permanent,
            target_url: Some(target_url.into()),
            include_path: false,
            include_query_string: false,
            used_by_path_maps: false,
        }
    }

    /// True if this configuration redirects permanently to `url`.
    pub fn is_permanent_redirect_to(&self, url: &str) -> bool {
        self.redirect_type == RedirectType::Permanent && self.target_url.as_deref() == Some(url)
    }
}

/// Live snapshot of a gateway's rules, pools, settings and redirects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub rules: Vec<RoutingRule>,
    pub backend_pools: Vec<BackendPool>,
    pub backend_settings: Vec<BackendSettings>,
    pub redirects: Vec<RedirectConfiguration>,
}

impl Inventory {
    /// Look up a rule by exact name.
    pub fn rule(&self, name: &str) -> Option<&RoutingRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn has_pool(&self, name: &str) -> bool {
        self.backend_pools.iter().any(|p| p.name == name)
    }

    pub fn has_settings(&self, name: &str) -> bool {
        self.backend_settings.iter().any(|s| s.name == name)
    }

    /// Look up a redirect configuration by name.
    pub fn redirect(&self, name: &str) -> Option<&RedirectConfiguration> {
        self.redirects.iter().find(|r| r.name == name)
    }

    /// Number of rules currently pointing at the named redirect configuration.
    pub fn redirect_references(&self, name: &str) -> usize {
        self.rules
            .iter()
            .filter(|r| r.target.redirect_configuration() == Some(name))
            .count()
    }

    /// Produce the snapshot that results from applying `patch`.
    pub fn with_patch(&self, patch: &GatewayPatch) -> Inventory {
        let mut next = self.clone();
        for rule in &mut next.rules {
            if let Some(target) = patch.rule_targets.get(&rule.name) {
                rule.target = target.clone();
            }
        }
        next.redirects
            .retain(|r| !patch.removed_redirects.contains(&r.name));
        next.redirects.extend(patch.added_redirects.iter().cloned());
        next
    }
}
