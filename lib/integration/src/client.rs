//! Client for the backend integrations service.
//!
//! Every call is a single `POST` with a multipart form body. Identity fields
//! (`integration_type`, `user_id`, `org_id`) are attached from the
//! [`SessionContext`]. There are no retries: a failed call is returned to the
//! caller as-is.

use crate::credential::Credentials;
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Client, Url};
use serde_json::Value as JsonValue;
use tether_core::{IntegrationType, SessionContext};
use tracing::{debug, instrument, warn};

/// Default location of the integrations service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/integrations";

const AUTHORIZE_PATH: &str = "authorize";
const CREDENTIALS_PATH: &str = "credentials";
const LOAD_PATH: &str = "load";

/// Operations offered by the backend integrations service.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait IntegrationsApi {
    /// Requests the provider consent URL for the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is not a URL.
    async fn authorize(&self, context: &SessionContext) -> Result<Url, ApiError>;

    /// Fetches the credentials stored after the consent flow, if any.
    async fn get_credentials(
        &self,
        context: &SessionContext,
    ) -> Result<Option<Credentials>, ApiError>;

    /// Loads sample data from the integration using the given credentials.
    async fn load_data(
        &self,
        integration_type: IntegrationType,
        credentials: &Credentials,
    ) -> Result<JsonValue, ApiError>;
}

/// reqwest-backed [`IntegrationsApi`] implementation.
#[derive(Debug, Clone)]
pub struct HttpIntegrationsClient {
    client: Client,
    base_url: Url,
}

impl HttpIntegrationsClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a client that sends requests through an existing reqwest client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ApiError> {
        let mut url = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        // Relative joins replace the last path segment unless it ends in '/'.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url: url,
        })
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    fn identity_form(context: &SessionContext) -> Form {
        context
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
    }

    async fn post_form(&self, path: &str, form: Form) -> Result<JsonValue, ApiError> {
        let url = self.endpoint(path)?;
        let endpoint = url.to_string();
        debug!(%endpoint, "sending integrations request");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            let detail = error_detail(&body);
            warn!(%endpoint, status = status.as_u16(), detail = ?detail, "integrations request failed");
            return Err(ApiError::Backend {
                endpoint,
                status: status.as_u16(),
                detail,
            });
        }

        debug!(%endpoint, status = status.as_u16(), "integrations request succeeded");

        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl IntegrationsApi for HttpIntegrationsClient {
    #[instrument(skip(self, context), fields(integration = %context.integration_type))]
    async fn authorize(&self, context: &SessionContext) -> Result<Url, ApiError> {
        let body = self
            .post_form(AUTHORIZE_PATH, Self::identity_form(context))
            .await?;

        let raw = match body {
            JsonValue::String(url) => url,
            other => {
                return Err(ApiError::Decode {
                    endpoint: AUTHORIZE_PATH.to_string(),
                    reason: format!("expected a URL string, got {other}"),
                });
            }
        };

        Url::parse(&raw).map_err(|e| ApiError::Decode {
            endpoint: AUTHORIZE_PATH.to_string(),
            reason: format!("invalid authorization URL: {e}"),
        })
    }

    #[instrument(skip(self, context), fields(integration = %context.integration_type))]
    async fn get_credentials(
        &self,
        context: &SessionContext,
    ) -> Result<Option<Credentials>, ApiError> {
        let body = self
            .post_form(CREDENTIALS_PATH, Self::identity_form(context))
            .await?;
        Ok(Credentials::from_json(body))
    }

    #[instrument(skip(self, credentials), fields(integration = %integration_type))]
    async fn load_data(
        &self,
        integration_type: IntegrationType,
        credentials: &Credentials,
    ) -> Result<JsonValue, ApiError> {
        let form = Form::new()
            .text(IntegrationType::field_name(), integration_type.as_str())
            .text("credentials", credentials.to_form_value());
        self.post_form(LOAD_PATH, form).await
    }
}

/// Extracts the service's `detail` message from an error body.
///
/// Falls back to the raw body when it is not a `{"detail": ...}` object.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(JsonValue::Object(map)) => match map.get("detail") {
            Some(JsonValue::String(detail)) => Some(detail.clone()),
            Some(JsonValue::Null) | None => Some(trimmed.to_string()),
            Some(other) => Some(other.to_string()),
        },
        _ => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::{OrgId, UserId};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(integration_type: IntegrationType) -> SessionContext {
        SessionContext::new(
            UserId::new("TestUser").expect("user"),
            OrgId::new("TestOrg").expect("org"),
            integration_type,
        )
    }

    fn client_for(server: &MockServer) -> HttpIntegrationsClient {
        HttpIntegrationsClient::new(&format!("{}/integrations", server.uri())).expect("client")
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = HttpIntegrationsClient::new("http://localhost:3000/integrations")
            .expect("client");
        assert_eq!(
            client.endpoint("authorize").expect("endpoint").as_str(),
            "http://localhost:3000/integrations/authorize"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        let err = HttpIntegrationsClient::new("/integrations").unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = HttpIntegrationsClient::new("ftp://example.com/integrations").unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn error_detail_prefers_detail_field() {
        assert_eq!(
            error_detail(r#"{"detail":"Invalid integration type"}"#),
            Some("Invalid integration type".to_string())
        );
        assert_eq!(error_detail("Bad Gateway"), Some("Bad Gateway".to_string()));
        assert_eq!(error_detail("  "), None);
    }

    #[tokio::test]
    async fn authorize_sends_identity_and_parses_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/integrations/authorize"))
            .and(body_string_contains("name=\"integration_type\""))
            .and(body_string_contains("hubspot"))
            .and(body_string_contains("TestUser"))
            .and(body_string_contains("TestOrg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!("https://app.hubspot.com/oauth/authorize?client_id=x")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = client_for(&server)
            .authorize(&context(IntegrationType::Hubspot))
            .await
            .expect("authorize");

        assert_eq!(url.host_str(), Some("app.hubspot.com"));
    }

    #[tokio::test]
    async fn authorize_surfaces_backend_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/integrations/authorize"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"detail": "Invalid integration type"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .authorize(&context(IntegrationType::Notion))
            .await
            .unwrap_err();

        match err {
            ApiError::Backend { status, detail, .. } => {
                assert_eq!(status, 400);
                assert_eq!(detail.as_deref(), Some("Invalid integration type"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn authorize_rejects_non_string_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/integrations/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": 1})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .authorize(&context(IntegrationType::Airtable))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn credentials_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/integrations/credentials"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let creds = client_for(&server)
            .get_credentials(&context(IntegrationType::Airtable))
            .await
            .expect("credentials")
            .expect("present");
        assert_eq!(creds.as_json()["access_token"], "tok");
    }

    #[tokio::test]
    async fn empty_credentials_are_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/integrations/credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let creds = client_for(&server)
            .get_credentials(&context(IntegrationType::Airtable))
            .await
            .expect("credentials");
        assert!(creds.is_none());
    }

    #[tokio::test]
    async fn load_sends_credentials_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/integrations/load"))
            .and(body_string_contains("name=\"credentials\""))
            .and(body_string_contains(r#"{"access_token":"tok"}"#))
            .and(body_string_contains("notion"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "page-1", "name": "Roadmap"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let creds = Credentials::from_json(json!({"access_token": "tok"})).expect("present");
        let data = client_for(&server)
            .load_data(IntegrationType::Notion, &creds)
            .await
            .expect("load");

        assert_eq!(data[0]["name"], "Roadmap");
    }

    #[tokio::test]
    async fn transport_failure_is_reported() {
        let client = HttpIntegrationsClient::new("http://127.0.0.1:9/integrations").expect("client");
        let err = client
            .authorize(&context(IntegrationType::Hubspot))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
