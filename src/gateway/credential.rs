//! Azure credentials for the management API.
//!
//! # Security
//! - Secrets are read ONLY from environment variables
//! - Tokens and secrets are never logged or serialized

use std::fmt;

use serde::Deserialize;

use crate::gateway::types::{GatewayError, GatewayResult};

/// Pre-issued bearer token (e.g. `az account get-access-token`).
pub const ACCESS_TOKEN_ENV_VAR: &str = "AZURE_ACCESS_TOKEN";
pub const TENANT_ID_ENV_VAR: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_ENV_VAR: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_ENV_VAR: &str = "AZURE_CLIENT_SECRET";

/// Token scope for Azure Resource Manager.
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// How to obtain a bearer token.
#[derive(Clone)]
pub enum Credential {
    /// A token handed in from outside.
    AccessToken(String),
    /// Service principal, client-credentials flow.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

// Manual Debug so secrets never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::AccessToken(_) => f.write_str("Credential::AccessToken(..)"),
            Credential::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("Credential::ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl Credential {
    /// Load credentials from environment variables.
    ///
    /// `AZURE_ACCESS_TOKEN` wins; otherwise all three service principal
    /// variables must be set.
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GatewayResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(ACCESS_TOKEN_ENV_VAR) {
            return Ok(Credential::AccessToken(token));
        }

        match (
            get(TENANT_ID_ENV_VAR),
            get(CLIENT_ID_ENV_VAR),
            get(CLIENT_SECRET_ENV_VAR),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Ok(Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            }),
            _ => Err(GatewayError::Credential(format!(
                "set {} or {}, {} and {}",
                ACCESS_TOKEN_ENV_VAR, TENANT_ID_ENV_VAR, CLIENT_ID_ENV_VAR, CLIENT_SECRET_ENV_VAR
            ))),
        }
    }

    /// Obtain a bearer token for the management API.
    pub async fn token(&self, http: &reqwest::Client, authority_host: &str) -> GatewayResult<String> {
        match self {
            Credential::AccessToken(token) => Ok(token.clone()),
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    authority_host.trim_end_matches('/'),
                    tenant_id
                );
                let res = http
                    .post(&url)
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("scope", MANAGEMENT_SCOPE),
                    ])
                    .send()
                    .await?;

                let status = res.status();
                if !status.is_success() {
                    let body = res.text().await.unwrap_or_default();
                    return Err(GatewayError::Credential(format!(
                        "token request returned {}: {}",
                        status, body
                    )));
                }

                let token: TokenResponse = res.json().await?;
                tracing::debug!(client_id = %client_id, "Acquired management API token");
                Ok(token.access_token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_access_token_wins() {
        let credential = Credential::from_lookup(lookup(&[
            (ACCESS_TOKEN_ENV_VAR, "tok"),
            (TENANT_ID_ENV_VAR, "t"),
            (CLIENT_ID_ENV_VAR, "c"),
            (CLIENT_SECRET_ENV_VAR, "s"),
        ]))
        .unwrap();
        assert!(matches!(credential, Credential::AccessToken(ref t) if t == "tok"));
    }

    #[test]
    fn test_service_principal() {
        let credential = Credential::from_lookup(lookup(&[
            (TENANT_ID_ENV_VAR, "t"),
            (CLIENT_ID_ENV_VAR, "c"),
            (CLIENT_SECRET_ENV_VAR, "super-secret"),
        ]))
        .unwrap();
        assert!(matches!(credential, Credential::ClientSecret { .. }));
        assert!(!format!("{:?}", credential).contains("super-secret"));
    }

    #[test]
    fn test_incomplete_service_principal() {
        let err = Credential::from_lookup(lookup(&[(TENANT_ID_ENV_VAR, "t"), (ACCESS_TOKEN_ENV_VAR, " ")]))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Credential(_)));
    }
}
