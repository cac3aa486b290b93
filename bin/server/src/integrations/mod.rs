//! Backend integrations service.
//!
//! This module provides:
//! - Provider OAuth clients (HubSpot, Airtable, Notion)
//! - The pending store that hands state, verifiers and credentials between
//!   requests
//! - Sample data loaders
//! - The `/integrations` routes tying them together

pub mod items;
pub mod oauth_state;
pub mod provider;
pub mod store;

mod routes;

pub use items::{IntegrationItem, load_items};
pub use oauth_state::OAuthState;
pub use provider::{AuthorizationRequest, OAuthProvider};
pub use routes::router;
pub use store::{PendingKey, PendingKind, PendingStore};

use crate::config::ServerConfig;
use crate::error::ProviderError;
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::Arc;
use tether_core::IntegrationType;

/// Shared state for the integrations routes.
#[derive(Clone)]
pub struct IntegrationsState {
    providers: Arc<HashMap<IntegrationType, OAuthProvider>>,
    store: PendingStore,
    http: reqwest::Client,
}

impl IntegrationsState {
    /// Creates the state from already built providers.
    pub fn new(
        providers: impl IntoIterator<Item = OAuthProvider>,
        store: PendingStore,
        http: reqwest::Client,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.integration_type(), provider))
            .collect();
        Self {
            providers: Arc::new(providers),
            store,
            http,
        }
    }

    /// Builds the providers configured in `config`.
    ///
    /// Providers without credentials are skipped; requests for them answer
    /// 503.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured provider has invalid settings or the
    /// HTTP client cannot be built.
    pub fn from_config(
        config: &ServerConfig,
        store: PendingStore,
    ) -> Result<Self, Report<ProviderError>> {
        let mut providers = Vec::new();
        for integration_type in IntegrationType::ALL {
            match OAuthProvider::from_config(integration_type, config) {
                Ok(provider) => {
                    tracing::info!(integration = %integration_type, "OAuth provider configured");
                    providers.push(provider);
                }
                Err(report) => match report.current_context() {
                    ProviderError::NotConfigured { .. } => {
                        tracing::warn!(integration = %integration_type, "OAuth provider not configured");
                    }
                    _ => return Err(report),
                },
            }
        }

        // Token endpoints must not be followed through redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProviderError::Configuration {
                details: format!("HTTP client error: {e}"),
            })?;

        Ok(Self::new(providers, store, http))
    }

    /// Returns the provider for an integration.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if the provider has no OAuth application.
    pub fn provider(
        &self,
        integration_type: IntegrationType,
    ) -> Result<&OAuthProvider, Report<ProviderError>> {
        self.providers.get(&integration_type).ok_or_else(|| {
            ProviderError::NotConfigured {
                integration: integration_type,
            }
            .into()
        })
    }

    /// The pending store.
    #[must_use]
    pub fn store(&self) -> &PendingStore {
        &self.store
    }
}
