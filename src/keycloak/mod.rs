//! Keycloak Admin API access
//!
//! [`AdminTransport`] is the seam between the reconciliation engine and the
//! network. [`KeycloakClient`] implements it over reqwest; tests substitute
//! mocks or in-memory fakes.

pub mod client;
pub mod types;
pub mod user_profile;
pub mod version;

pub use client::KeycloakClient;
pub use types::*;
pub use version::{CapabilitySet, ServerVersion};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by the transport. Opaque to the engine beyond "not found".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }

    /// The request was refused by the server or never sent, so it had no effect.
    ///
    /// `Auth` covers admin token acquisition, which happens before the request.
    pub fn left_state_unchanged(&self) -> bool {
        matches!(
            self,
            TransportError::NotFound { .. } | TransportError::Status { .. } | TransportError::Auth(_)
        )
    }
}

/// Authenticated JSON access to the admin API.
///
/// Paths are relative to the server base URL, e.g. `/admin/realms/acme`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminTransport: Send + Sync {
    /// Version string reported by the server, e.g. `24.0.5`
    async fn server_version(&self) -> Result<String, TransportError>;

    async fn get_json(&self, path: &str) -> Result<Value, TransportError>;

    async fn put_json(&self, path: &str, body: &Value) -> Result<(), TransportError>;
}
