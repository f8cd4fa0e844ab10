//! Configuration management for realm profile reconciliation

use crate::domain::AbsentPolicyInterpretation;
use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Keycloak connection configuration
    pub keycloak: KeycloakConfig,
    /// Logging configuration
    pub telemetry: TelemetryConfig,
    /// Reconciliation behavior
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Server base URL (e.g., http://keycloak:8080)
    pub url: String,
    /// Realm the admin credentials authenticate against
    pub admin_realm: String,
    pub admin_client_id: String,
    pub admin_client_secret: String,
    /// Password grant is used when set, client credentials otherwise
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub timeout_secs: u64,
    /// Pinned server version; skips the server-info lookup
    pub version: Option<String>,
}

impl KeycloakConfig {
    /// Defaults for a local development server at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            admin_realm: "master".to_string(),
            admin_client_id: "admin-cli".to_string(),
            admin_client_secret: String::new(),
            admin_username: None,
            admin_password: None,
            timeout_secs: 30,
            version: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileConfig {
    /// How an absent unmanaged attribute policy compares on versions that support it
    pub absent_unmanaged_policy: AbsentPolicyInterpretation,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("KEYCLOAK_URL").context("KEYCLOAK_URL is required")?;

        Ok(Self {
            keycloak: KeycloakConfig {
                url: url.trim_end_matches('/').to_string(),
                admin_realm: env::var("KEYCLOAK_ADMIN_REALM")
                    .unwrap_or_else(|_| "master".to_string()),
                admin_client_id: env::var("KEYCLOAK_ADMIN_CLIENT_ID")
                    .unwrap_or_else(|_| "admin-cli".to_string()),
                admin_client_secret: env::var("KEYCLOAK_ADMIN_CLIENT_SECRET")
                    .unwrap_or_else(|_| String::new()),
                admin_username: env::var("KEYCLOAK_ADMIN").ok().filter(|s| !s.is_empty()),
                admin_password: env::var("KEYCLOAK_ADMIN_PASSWORD").ok(),
                timeout_secs: env::var("KEYCLOAK_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid KEYCLOAK_TIMEOUT_SECS")?,
                version: env::var("KEYCLOAK_VERSION").ok().filter(|s| !s.is_empty()),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            },
            reconcile: ReconcileConfig {
                absent_unmanaged_policy: env::var("PROFILE_ABSENT_UNMANAGED_POLICY")
                    .unwrap_or_else(|_| "unspecified".to_string())
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("Invalid PROFILE_ABSENT_UNMANAGED_POLICY")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keycloak_config_defaults() {
        let config = KeycloakConfig::new("http://localhost:8080");
        assert_eq!(config.admin_realm, "master");
        assert_eq!(config.admin_client_id, "admin-cli");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.admin_username.is_none());
        assert!(config.version.is_none());
    }

    #[test]
    fn test_reconcile_config_default() {
        let config = ReconcileConfig::default();
        assert_eq!(
            config.absent_unmanaged_policy,
            AbsentPolicyInterpretation::Unspecified
        );
    }

    #[test]
    fn test_from_env() {
        // Single test touching the environment to avoid races between tests
        env::set_var("KEYCLOAK_URL", "http://keycloak:8080/");
        env::set_var("KEYCLOAK_ADMIN", "admin");
        env::set_var("KEYCLOAK_VERSION", "24.0.5");
        env::set_var("PROFILE_ABSENT_UNMANAGED_POLICY", "disabled");

        let config = Config::from_env().unwrap();
        assert_eq!(config.keycloak.url, "http://keycloak:8080");
        assert_eq!(config.keycloak.admin_username.as_deref(), Some("admin"));
        assert_eq!(config.keycloak.version.as_deref(), Some("24.0.5"));
        assert_eq!(
            config.reconcile.absent_unmanaged_policy,
            AbsentPolicyInterpretation::Disabled
        );

        env::set_var("PROFILE_ABSENT_UNMANAGED_POLICY", "sometimes");
        assert!(Config::from_env().is_err());

        env::remove_var("PROFILE_ABSENT_UNMANAGED_POLICY");
        env::remove_var("KEYCLOAK_VERSION");
        env::remove_var("KEYCLOAK_ADMIN");
        env::remove_var("KEYCLOAK_URL");
        assert!(Config::from_env().is_err());
    }
}
