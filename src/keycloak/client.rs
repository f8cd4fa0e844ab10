//! Keycloak Admin API client
//!
//! Handles admin authentication with token caching and exposes the generic
//! JSON get/put used by the user-profile reconciliation.

use super::types::ServerInfo;
use super::{AdminTransport, TransportError};
use crate::config::KeycloakConfig;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Keycloak Admin API client
#[derive(Clone)]
pub struct KeycloakClient {
    config: KeycloakConfig,
    http_client: Client,
    token: Arc<RwLock<Option<AdminToken>>>,
    server_version: Arc<RwLock<Option<String>>>,
}

#[derive(Debug, Clone)]
struct AdminToken {
    access_token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl KeycloakClient {
    /// Create a new Keycloak client
    pub fn new(config: KeycloakConfig) -> Result<Self, TransportError> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let server_version = config.version.clone();
        Ok(Self {
            config,
            http_client,
            token: Arc::new(RwLock::new(None)),
            server_version: Arc::new(RwLock::new(server_version)),
        })
    }

    /// Get the server base URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Get admin access token (with caching)
    async fn get_admin_token(&self) -> Result<String, TransportError> {
        // Check if we have a valid cached token
        {
            let token = self.token.read().await;
            if let Some(ref t) = *token {
                if t.expires_at > chrono::Utc::now() + chrono::Duration::seconds(30) {
                    return Ok(t.access_token.clone());
                }
            }
        }

        let token_url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.config.url,
            urlencoding::encode(&self.config.admin_realm)
        );

        let mut params = vec![("client_id", self.config.admin_client_id.as_str())];
        match (&self.config.admin_username, &self.config.admin_password) {
            (Some(username), password) => {
                params.push(("grant_type", "password"));
                params.push(("username", username.as_str()));
                params.push(("password", password.as_deref().unwrap_or_default()));
            }
            (None, _) => params.push(("grant_type", "client_credentials")),
        }
        if !self.config.admin_client_secret.is_empty() {
            params.push(("client_secret", self.config.admin_client_secret.as_str()));
        }

        let response = self
            .http_client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TransportError::Auth(format!("Failed to get admin token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Auth(format!(
                "Failed to get admin token: {} - {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Auth(format!("Failed to parse token response: {}", e)))?;

        let admin_token = AdminToken {
            access_token: token_response.access_token.clone(),
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(token_response.expires_in),
        };

        // Cache the token
        {
            let mut token = self.token.write().await;
            *token = Some(admin_token);
        }

        Ok(token_response.access_token)
    }

    /// Map non-success responses into the transport taxonomy
    async fn check_status(path: &str, response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AdminTransport for KeycloakClient {
    async fn server_version(&self) -> Result<String, TransportError> {
        {
            let version = self.server_version.read().await;
            if let Some(ref v) = *version {
                return Ok(v.clone());
            }
        }

        let info: ServerInfo = serde_json::from_value(self.get_json("/admin/serverinfo").await?)
            .map_err(|e| TransportError::Decode(format!("Failed to parse server info: {}", e)))?;
        debug!(version = %info.system_info.version, "Discovered Keycloak version");

        let mut version = self.server_version.write().await;
        *version = Some(info.system_info.version.clone());
        Ok(info.system_info.version)
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let token = self.get_admin_token().await?;
        let url = format!("{}{}", self.config.url, path);
        debug!(%url, "GET");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| TransportError::Network(format!("GET {}: {}", path, e)))?;

        let response = Self::check_status(path, response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("GET {}: {}", path, e)))?;

        // Some endpoints answer 200 or 204 with no body when nothing is configured
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| TransportError::Decode(format!("GET {}: {}", path, e)))
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<(), TransportError> {
        let token = self.get_admin_token().await?;
        let url = format!("{}{}", self.config.url, path);
        debug!(%url, "PUT");

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(format!("PUT {}: {}", path, e)))?;

        Self::check_status(path, response).await?;
        Ok(())
    }
}
