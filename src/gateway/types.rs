//! Gateway client error definitions.

use thiserror::Error;

pub use crate::config::schema::GatewayRef;

/// Errors that can occur while reading or updating a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway resource does not exist.
    #[error("Application gateway not found: {0}")]
    NotFound(String),

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The management API answered with an unexpected status.
    #[error("Management API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The gateway changed since it was fetched (etag mismatch).
    #[error("Gateway was modified concurrently: {0}")]
    Conflict(String),

    /// No usable credentials, or token acquisition failed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// The gateway document did not have the expected shape.
    #[error("Malformed gateway document: {0}")]
    Document(String),

    /// The long-running update finished in a non-success state.
    #[error("Gateway update finished with status {0}")]
    OperationFailed(String),

    /// The long-running update did not finish in time.
    #[error("Gateway update still running after {0} seconds")]
    Timeout(u64),

    /// Snapshot file access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::Api {
            status: 403,
            body: "AuthorizationFailed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Management API returned 403: AuthorizationFailed"
        );

        let err = GatewayError::Timeout(600);
        assert!(err.to_string().contains("600"));
    }

    #[test]
    fn test_gateway_ref_identity() {
        let gateway = GatewayRef {
            subscription_id: "0000".into(),
            resource_group: "rg-web".into(),
            name: "agw-prod".into(),
        };
        assert_eq!(gateway.identity(), "0000/rg-web/agw-prod");
    }
}
