//! OAuth 2.0 clients for the supported providers.
//!
//! HubSpot and Airtable use PKCE and send client credentials in a
//! form-encoded token request. Notion uses no PKCE; its token request is a
//! JSON body with HTTP Basic client authentication. Airtable and Notion also
//! need `owner=user` on the consent URL.

use crate::config::{ProviderConfig, ServerConfig};
use crate::error::ProviderError;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, StandardRevocableToken,
    StandardTokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use reqwest::Url;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use tether_core::IntegrationType;
use tracing::{debug, instrument};

/// Provider-specific token response fields (Notion's workspace and bot ids,
/// for instance) kept alongside the standard ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderTokenFields {
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ExtraTokenFields for ProviderTokenFields {}

/// Token response type for every provider.
type ProviderTokenResponse = StandardTokenResponse<ProviderTokenFields, BasicTokenType>;

type ProviderClient = oauth2::Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Public endpoints and behavior of one provider.
struct ProviderDefaults {
    auth_url: &'static str,
    token_url: &'static str,
    api_base_url: &'static str,
    scopes: &'static str,
    use_pkce: bool,
    json_token_request: bool,
    owner_user: bool,
}

fn defaults(integration_type: IntegrationType) -> ProviderDefaults {
    match integration_type {
        IntegrationType::Hubspot => ProviderDefaults {
            auth_url: "https://app.hubspot.com/oauth/authorize",
            token_url: "https://api.hubapi.com/oauth/v1/token",
            api_base_url: "https://api.hubapi.com",
            scopes: "crm.objects.contacts.read crm.objects.contacts.write \
                     crm.schemas.deals.read crm.schemas.deals.write oauth",
            use_pkce: true,
            json_token_request: false,
            owner_user: false,
        },
        IntegrationType::Airtable => ProviderDefaults {
            auth_url: "https://airtable.com/oauth2/v1/authorize",
            token_url: "https://airtable.com/oauth2/v1/token",
            api_base_url: "https://api.airtable.com",
            scopes: "data.records:read data.records:write data.recordComments:read \
                     data.recordComments:write schema.bases:read schema.bases:write",
            use_pkce: true,
            json_token_request: false,
            owner_user: true,
        },
        IntegrationType::Notion => ProviderDefaults {
            auth_url: "https://api.notion.com/v1/oauth/authorize",
            token_url: "https://api.notion.com/v1/oauth/token",
            api_base_url: "https://api.notion.com",
            scopes: "",
            use_pkce: false,
            json_token_request: true,
            owner_user: true,
        },
    }
}

/// A consent URL plus the PKCE verifier to keep until the callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub pkce_verifier: Option<String>,
}

/// A configured OAuth client for one provider.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    integration_type: IntegrationType,
    client_id: String,
    client_secret: String,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
    api_base_url: Url,
    use_pkce: bool,
    json_token_request: bool,
    owner_user: bool,
}

impl OAuthProvider {
    /// Creates a provider client from configuration.
    ///
    /// `public_url` is used to derive the redirect URL when none is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` without a client ID and secret, and
    /// `Configuration` when a configured URL is invalid.
    pub fn new(
        integration_type: IntegrationType,
        config: &ProviderConfig,
        public_url: &str,
    ) -> Result<Self, Report<ProviderError>> {
        let defaults = defaults(integration_type);

        let (Some(client_id), Some(client_secret)) = (
            config.client_id.as_deref().filter(|id| !id.is_empty()),
            config.client_secret.as_deref().filter(|secret| !secret.is_empty()),
        ) else {
            return Err(ProviderError::NotConfigured {
                integration: integration_type,
            }
            .into());
        };

        let redirect_url = config.redirect_url.clone().unwrap_or_else(|| {
            format!(
                "{}/integrations/oauth2callback?integration_type={}",
                public_url.trim_end_matches('/'),
                integration_type
            )
        });
        let redirect_url = RedirectUrl::new(redirect_url).map_err(|e| {
            ProviderError::Configuration {
                details: format!("invalid {integration_type} redirect URL: {e}"),
            }
        })?;

        let auth_url = AuthUrl::new(
            config
                .auth_url
                .clone()
                .unwrap_or_else(|| defaults.auth_url.to_string()),
        )
        .map_err(|e| ProviderError::Configuration {
            details: format!("invalid {integration_type} auth URL: {e}"),
        })?;

        let token_url = TokenUrl::new(
            config
                .token_url
                .clone()
                .unwrap_or_else(|| defaults.token_url.to_string()),
        )
        .map_err(|e| ProviderError::Configuration {
            details: format!("invalid {integration_type} token URL: {e}"),
        })?;

        let api_base_url = Url::parse(
            config
                .api_base_url
                .as_deref()
                .unwrap_or(defaults.api_base_url),
        )
        .map_err(|e| ProviderError::Configuration {
            details: format!("invalid {integration_type} API URL: {e}"),
        })?;

        let scopes = config
            .scopes
            .as_deref()
            .unwrap_or(defaults.scopes)
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Self {
            integration_type,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_url,
            token_url,
            redirect_url,
            scopes,
            api_base_url,
            use_pkce: defaults.use_pkce,
            json_token_request: defaults.json_token_request,
            owner_user: defaults.owner_user,
        })
    }

    /// Creates the provider client for `integration_type` from server config.
    ///
    /// # Errors
    ///
    /// See [`OAuthProvider::new`].
    pub fn from_config(
        integration_type: IntegrationType,
        config: &ServerConfig,
    ) -> Result<Self, Report<ProviderError>> {
        Self::new(
            integration_type,
            config.provider(integration_type),
            &config.public_url,
        )
    }

    /// The integration this client serves.
    #[must_use]
    pub fn integration_type(&self) -> IntegrationType {
        self.integration_type
    }

    /// Whether the consent flow uses PKCE.
    #[must_use]
    pub fn uses_pkce(&self) -> bool {
        self.use_pkce
    }

    /// Base URL of the provider's data API.
    #[must_use]
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    fn client(&self) -> ProviderClient {
        ProviderClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_redirect_uri(self.redirect_url.clone())
            .set_auth_type(AuthType::RequestBody)
    }

    /// Builds the consent URL carrying `state`.
    #[must_use]
    pub fn authorization_url(&self, state: String) -> AuthorizationRequest {
        let client = self.client().set_auth_uri(self.auth_url.clone());

        let mut request = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new));

        if self.owner_user {
            request = request.add_extra_param("owner", "user");
        }

        let pkce_verifier = if self.use_pkce {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            request = request.set_pkce_challenge(challenge);
            Some(verifier.secret().clone())
        } else {
            None
        };

        let (url, _state) = request.url();
        debug!(integration = %self.integration_type, pkce = pkce_verifier.is_some(), "built consent URL");

        AuthorizationRequest { url, pkce_verifier }
    }

    /// Exchanges an authorization code for the provider's token response.
    ///
    /// The whole response is returned as JSON, including provider-specific
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns `TokenExchange` if the provider rejects the code or cannot be
    /// reached.
    #[instrument(skip(self, http, code, pkce_verifier), fields(integration = %self.integration_type))]
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        pkce_verifier: Option<String>,
    ) -> Result<JsonValue, Report<ProviderError>> {
        if self.json_token_request {
            return self.exchange_code_json(http, code).await;
        }

        let client = self.client().set_token_uri(self.token_url.clone());

        let mut request = client.exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier));
        }

        let token = request
            .request_async(http)
            .await
            .map_err(|e| ProviderError::TokenExchange {
                details: e.to_string(),
            })?;

        debug!("authorization code exchanged");

        Ok(
            serde_json::to_value(&token).map_err(|e| ProviderError::Decode {
                details: e.to_string(),
            })?,
        )
    }

    /// Token request with a JSON body and HTTP Basic client credentials.
    ///
    /// The raw response is kept as is.
    async fn exchange_code_json(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> Result<JsonValue, Report<ProviderError>> {
        let response = http
            .post(self.token_url.url().clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(&json!({
                "grant_type": "authorization_code",
                "code": code,
                "redirect_uri": self.redirect_url.as_str(),
            }))
            .send()
            .await
            .map_err(|e| ProviderError::TokenExchange {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::TokenExchange {
                details: format!("token endpoint returned {status}: {body}"),
            }
            .into());
        }

        let token: JsonValue = response
            .json()
            .await
            .map_err(|e| ProviderError::TokenExchange {
                details: format!("invalid token response: {e}"),
            })?;
        if token.get("access_token").and_then(JsonValue::as_str).is_none() {
            return Err(ProviderError::TokenExchange {
                details: "token response has no access_token".to_string(),
            }
            .into());
        }

        debug!("authorization code exchanged");
        Ok(token)
    }
}
