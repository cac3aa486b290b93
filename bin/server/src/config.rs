//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! `__` as the separator, e.g. `HUBSPOT__CLIENT_ID` or
//! `PENDING__TTL_SECONDS`.

use serde::Deserialize;
use tether_core::IntegrationType;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Externally visible origin of this server.
    /// Used to derive default OAuth redirect URLs.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Settings handed to the browser.
    #[serde(default)]
    pub client: ClientConfig,

    /// Cross-origin settings for the integrations endpoints.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Lifetime of pending OAuth state and credentials.
    #[serde(default)]
    pub pending: PendingConfig,

    /// HubSpot OAuth application.
    #[serde(default)]
    pub hubspot: ProviderConfig,

    /// Airtable OAuth application.
    #[serde(default)]
    pub airtable: ProviderConfig,

    /// Notion OAuth application.
    #[serde(default)]
    pub notion: ProviderConfig,
}

/// Settings delivered to the browser UI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the integrations service as seen from the browser.
    /// When unset the browser uses its own origin plus `/integrations`.
    pub api_base_url: Option<String>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of origins allowed to call the integrations API.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl CorsConfig {
    /// Returns the allowed origins, trimmed, without empty entries.
    #[must_use]
    pub fn origins(&self) -> Vec<&str> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Pending-state store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PendingConfig {
    /// Seconds a pending state, verifier or credential bundle stays readable.
    #[serde(default = "default_pending_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Interval between purges of expired entries, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_pending_ttl_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// OAuth application settings for one provider.
///
/// Unset endpoints fall back to the provider's public defaults. A provider
/// without a client ID and secret is reported as not configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Defaults to `{public_url}/integrations/oauth2callback?integration_type={type}`.
    pub redirect_url: Option<String>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    /// Space-separated scopes; overrides the provider's default scopes.
    pub scopes: Option<String>,
    /// Base URL of the provider's data API.
    pub api_base_url: Option<String>,
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_allowed_origins() -> String {
    "http://localhost:3000".to_string()
}

fn default_pending_ttl_seconds() -> u64 {
    600
}

fn default_cleanup_interval_seconds() -> u64 {
    60
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the OAuth application settings for an integration.
    #[must_use]
    pub fn provider(&self, integration_type: IntegrationType) -> &ProviderConfig {
        match integration_type {
            IntegrationType::Hubspot => &self.hubspot,
            IntegrationType::Airtable => &self.airtable,
            IntegrationType::Notion => &self.notion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_config_has_correct_defaults() {
        let config = PendingConfig::default();
        assert_eq!(config.ttl_seconds, 600);
        assert_eq!(config.cleanup_interval_seconds, 60);
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = CorsConfig {
            allowed_origins: "http://localhost:3000, https://app.example.com,,".to_string(),
        };
        assert_eq!(
            config.origins(),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
    }

    #[test]
    fn empty_source_uses_defaults() {
        let config: ServerConfig = config::Config::builder()
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");

        assert_eq!(config.public_url, "http://localhost:3000");
        assert!(config.client.api_base_url.is_none());
        assert!(config.provider(IntegrationType::Notion).client_id.is_none());
    }
}
