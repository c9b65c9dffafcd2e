//! Azure Resource Manager client for application gateways.
//!
//! # Responsibilities
//! - GET the gateway document and map it to an inventory
//! - PUT the patched document back in one request (optimistic concurrency via etag)
//! - Follow the long-running operation until it settles
//!
//! # Design Decisions
//! - The document fetched in this run is the base for the update; never cached
//!   across runs
//! - Every request has a timeout; polling has an attempt cap and a deadline

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, ETAG, IF_MATCH};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::config::schema::{AzureConfig, RetryConfig, TimeoutConfig};
use crate::gateway::arm;
use crate::gateway::client::GatewayClient;
use crate::gateway::credential::Credential;
use crate::gateway::inventory::Inventory;
use crate::gateway::patch::GatewayPatch;
use crate::gateway::types::{GatewayError, GatewayRef, GatewayResult};
use crate::resilience::backoff::poll_delay;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Document and etag from the last fetch.
#[derive(Debug)]
struct Fetched {
    document: Value,
    etag: Option<String>,
}

/// Gateway client talking to the ARM REST API.
#[derive(Debug)]
pub struct AzureGatewayClient {
    http: reqwest::Client,
    credential: Credential,
    azure: AzureConfig,
    retries: RetryConfig,
    operation_timeout: Duration,
    gateway: GatewayRef,
    resource_url: Url,
    fetched: Mutex<Option<Fetched>>,
}

impl AzureGatewayClient {
    /// Create a client for one gateway.
    pub fn new(
        gateway: GatewayRef,
        credential: Credential,
        azure: AzureConfig,
        timeouts: &TimeoutConfig,
        retries: RetryConfig,
    ) -> GatewayResult<Self> {
        let resource_url = resource_url(&azure, &gateway)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .build()?;

        tracing::debug!(url = %resource_url, "Azure gateway client initialized");

        Ok(Self {
            http,
            credential,
            azure,
            retries,
            operation_timeout: Duration::from_secs(timeouts.operation_secs),
            gateway,
            resource_url,
            fetched: Mutex::new(None),
        })
    }

    async fn auth_headers(&self) -> GatewayResult<HeaderMap> {
        let token = self
            .credential
            .token(&self.http, &self.azure.authority_host)
            .await?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| GatewayError::Credential("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn get_document(&self, headers: &HeaderMap) -> GatewayResult<(Value, Option<String>)> {
        let res = self
            .http
            .get(self.resource_url.clone())
            .headers(headers.clone())
            .send()
            .await?;

        match res.status() {
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound(self.gateway.identity())),
            status if !status.is_success() => Err(api_error(res).await),
            _ => {
                let header_etag = res
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let document: Value = res.json().await?;
                let etag = header_etag.or_else(|| {
                    document
                        .get("etag")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
                Ok((document, etag))
            }
        }
    }

    /// Poll until the update settles.
    async fn wait_for_completion(
        &self,
        headers: &HeaderMap,
        operation_url: Option<String>,
    ) -> GatewayResult<()> {
        let started = Instant::now();

        for attempt in 1..=self.retries.max_attempts.max(1) {
            if started.elapsed() >= self.operation_timeout {
                break;
            }
            tokio::time::sleep(poll_delay(attempt, &self.retries)).await;

            let status = match &operation_url {
                Some(url) => {
                    let res = self.http.get(url).headers(headers.clone()).send().await?;
                    if !res.status().is_success() {
                        return Err(api_error(res).await);
                    }
                    let body: Value = res.json().await?;
                    body.get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("InProgress")
                        .to_string()
                }
                None => {
                    let (document, _) = self.get_document(headers).await?;
                    provisioning_state(&document).unwrap_or("Updating").to_string()
                }
            };

            tracing::debug!(attempt, status = %status, "Gateway update status");
            match status.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" | "Cancelled" => {
                    return Err(GatewayError::OperationFailed(status));
                }
                _ => {}
            }
        }

        Err(GatewayError::Timeout(started.elapsed().as_secs()))
    }
}

impl GatewayClient for AzureGatewayClient {
    fn identity(&self) -> String {
        self.gateway.identity()
    }

    async fn fetch_inventory(&self) -> GatewayResult<Inventory> {
        let headers = self.auth_headers().await?;
        let (document, etag) = self.get_document(&headers).await?;
        let inventory = arm::inventory_from_document(&document)?;

        tracing::info!(
            gateway = %self.gateway.name,
            rules = inventory.rules.len(),
            backend_pools = inventory.backend_pools.len(),
            redirects = inventory.redirects.len(),
            "Fetched gateway inventory"
        );

        *self.fetched.lock().await = Some(Fetched { document, etag });
        Ok(inventory)
    }

    async fn apply_patch(&self, patch: &GatewayPatch) -> GatewayResult<()> {
        let headers = self.auth_headers().await?;

        let Some(Fetched { mut document, etag }) = self.fetched.lock().await.take() else {
            return Err(GatewayError::Document(
                "inventory must be fetched before applying a patch".into(),
            ));
        };
        arm::apply_patch_to_document(&mut document, patch)?;

        let mut request = self
            .http
            .put(self.resource_url.clone())
            .headers(headers.clone())
            .json(&document);
        if let Some(etag) = &etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                request = request.header(IF_MATCH, value);
            }
        }

        tracing::info!(
            gateway = %self.gateway.name,
            rules = patch.rule_targets.len(),
            added_redirects = patch.added_redirects.len(),
            removed_redirects = patch.removed_redirects.len(),
            "Updating gateway"
        );
        let res = request.send().await?;

        match res.status() {
            StatusCode::PRECONDITION_FAILED => {
                return Err(GatewayError::Conflict(self.gateway.identity()));
            }
            StatusCode::NOT_FOUND => return Err(GatewayError::NotFound(self.gateway.identity())),
            status if !status.is_success() => return Err(api_error(res).await),
            _ => {}
        }

        let operation_url = res
            .headers()
            .get(ASYNC_OPERATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let settled = res.status() == StatusCode::OK && operation_url.is_none() && {
            let body: Value = res.json().await.unwrap_or(Value::Null);
            provisioning_state(&body) == Some("Succeeded")
        };

        if !settled {
            self.wait_for_completion(&headers, operation_url).await?;
        }
        tracing::info!(gateway = %self.gateway.name, "Gateway update succeeded");
        Ok(())
    }
}

fn resource_url(azure: &AzureConfig, gateway: &GatewayRef) -> GatewayResult<Url> {
    let raw = format!(
        "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/applicationGateways/{}?api-version={}",
        azure.management_endpoint.trim_end_matches('/'),
        gateway.subscription_id,
        gateway.resource_group,
        gateway.name,
        azure.api_version
    );
    Url::parse(&raw).map_err(|e| {
        GatewayError::Document(format!("invalid management URL '{}': {}", raw, e))
    })
}

fn provisioning_state(document: &Value) -> Option<&str> {
    document
        .get("properties")?
        .get("provisioningState")?
        .as_str()
}

async fn api_error(res: reqwest::Response) -> GatewayError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    GatewayError::Api { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_url() {
        let gateway = GatewayRef {
            subscription_id: "0000".into(),
            resource_group: "rg-web".into(),
            name: "agw-prod".into(),
        };
        let azure = AzureConfig {
            management_endpoint: "https://management.azure.com/".into(),
            ..Default::default()
        };
        let url = resource_url(&azure, &gateway).unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.azure.com/subscriptions/0000/resourceGroups/rg-web/providers/Microsoft.Network/applicationGateways/agw-prod?api-version=2023-09-01"
        );
    }

    #[test]
    fn test_provisioning_state() {
        let doc = json!({ "properties": { "provisioningState": "Updating" } });
        assert_eq!(provisioning_state(&doc), Some("Updating"));
        assert_eq!(provisioning_state(&json!({})), None);
    }
}
