//! HTTP handlers for the `/integrations` routes.
//!
//! - `POST /authorize` - consent URL for a provider
//! - `GET /oauth2callback` - provider redirect target
//! - `POST /credentials` - one-shot pickup of exchanged credentials
//! - `POST /load` - sample items for stored credentials
//! - `GET /health` - liveness

use super::items::{IntegrationItem, load_items};
use super::oauth_state::OAuthState;
use super::store::{PendingKey, PendingKind};
use super::IntegrationsState;
use crate::error::{ProviderError, RouteError};
use axum::{
    Json, Router,
    extract::{Multipart, Query, State},
    response::Html,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use tether_core::{IntegrationType, OrgId, UserId};
use tracing::{debug, info};

/// Page served to the popup once credentials are stored.
const CLOSE_WINDOW_PAGE: &str = "<html><script>window.close();</script></html>";

/// Creates the integrations router.
pub fn router<S>(state: IntegrationsState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/authorize", post(authorize))
        .route("/oauth2callback", get(oauth2callback))
        .route("/credentials", post(credentials))
        .route("/load", post(load))
        .route("/health", get(health))
        .with_state(state)
}

/// Text fields of a multipart request.
struct FormFields(HashMap<String, String>);

impl FormFields {
    async fn read(mut multipart: Multipart) -> Result<Self, RouteError> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            ProviderError::InvalidField {
                field: "form",
                reason: e.body_text(),
            }
        })? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field.text().await.map_err(|e| ProviderError::InvalidField {
                field: "form",
                reason: e.body_text(),
            })?;
            fields.insert(name, value);
        }
        Ok(Self(fields))
    }

    fn required(&self, field: &'static str) -> Result<&str, RouteError> {
        Ok(self
            .0
            .get(field)
            .map(String::as_str)
            .ok_or(ProviderError::MissingField { field })?)
    }

    fn integration_type(&self) -> Result<IntegrationType, RouteError> {
        parse_integration_type(self.required(IntegrationType::field_name())?)
    }

    fn identity(&self) -> Result<(UserId, OrgId), RouteError> {
        let user_id = UserId::new(self.required(UserId::field_name())?).map_err(|e| {
            ProviderError::InvalidField {
                field: UserId::field_name(),
                reason: e.to_string(),
            }
        })?;
        let org_id = OrgId::new(self.required(OrgId::field_name())?).map_err(|e| {
            ProviderError::InvalidField {
                field: OrgId::field_name(),
                reason: e.to_string(),
            }
        })?;
        Ok((user_id, org_id))
    }
}

fn parse_integration_type(value: &str) -> Result<IntegrationType, RouteError> {
    Ok(
        IntegrationType::from_str(value).map_err(|_| ProviderError::InvalidIntegrationType {
            value: value.to_string(),
        })?,
    )
}

fn pending_key(
    kind: PendingKind,
    integration_type: IntegrationType,
    user_id: &UserId,
    org_id: &OrgId,
) -> PendingKey {
    PendingKey::new(kind, integration_type, org_id.clone(), user_id.clone())
}

/// Returns the provider consent URL for the posted identity.
async fn authorize(
    State(state): State<IntegrationsState>,
    multipart: Multipart,
) -> Result<Json<String>, RouteError> {
    let form = FormFields::read(multipart).await?;
    let integration_type = form.integration_type()?;
    let (user_id, org_id) = form.identity()?;
    let provider = state.provider(integration_type)?;

    let oauth_state = OAuthState::generate(user_id.clone(), org_id.clone());
    let request = provider.authorization_url(oauth_state.encode());

    let store = state.store();
    store
        .put(
            pending_key(PendingKind::State, integration_type, &user_id, &org_id),
            oauth_state.state,
        )
        .await;
    if let Some(verifier) = request.pkce_verifier {
        store
            .put(
                pending_key(PendingKind::Verifier, integration_type, &user_id, &org_id),
                verifier,
            )
            .await;
    }

    info!(integration = %integration_type, %user_id, %org_id, "issued consent URL");
    Ok(Json(request.url.to_string()))
}

/// Query parameters of the provider redirect.
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    integration_type: String,
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchanges the authorization code and parks the credentials.
async fn oauth2callback(
    State(state): State<IntegrationsState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Html<&'static str>, RouteError> {
    let integration_type = parse_integration_type(&query.integration_type)?;

    if let Some(error) = query.error {
        return Err(ProviderError::ProviderDenied {
            description: query.error_description.unwrap_or(error),
        }
        .into());
    }

    let encoded_state = query
        .state
        .ok_or(ProviderError::MissingField { field: "state" })?;
    let code = query
        .code
        .ok_or(ProviderError::MissingField { field: "code" })?;

    let oauth_state = OAuthState::decode(&encoded_state)?;
    let user_id = &oauth_state.user_id;
    let org_id = &oauth_state.org_id;

    let store = state.store();
    let state_key = pending_key(PendingKind::State, integration_type, user_id, org_id);
    let verifier_key = pending_key(PendingKind::Verifier, integration_type, user_id, org_id);

    let saved = store.get(&state_key).await;
    if saved.as_deref() != Some(oauth_state.state.as_str()) {
        return Err(ProviderError::StateMismatch.into());
    }

    let provider = state.provider(integration_type)?;
    let verifier = if provider.uses_pkce() {
        store.get(&verifier_key).await
    } else {
        None
    };

    let token = provider
        .exchange_code(&state.http, &code, verifier)
        .await?;

    store.remove(&state_key).await;
    store.remove(&verifier_key).await;
    store
        .put(
            pending_key(PendingKind::Credentials, integration_type, user_id, org_id),
            token.to_string(),
        )
        .await;

    info!(integration = %integration_type, %user_id, %org_id, "stored pending credentials");
    Ok(Html(CLOSE_WINDOW_PAGE))
}

/// Hands out the stored credentials once.
async fn credentials(
    State(state): State<IntegrationsState>,
    multipart: Multipart,
) -> Result<Json<JsonValue>, RouteError> {
    let form = FormFields::read(multipart).await?;
    let integration_type = form.integration_type()?;
    let (user_id, org_id) = form.identity()?;

    let stored = state
        .store()
        .take(&pending_key(
            PendingKind::Credentials,
            integration_type,
            &user_id,
            &org_id,
        ))
        .await
        .ok_or(ProviderError::NoCredentials)?;

    let credentials = serde_json::from_str(&stored).map_err(|e| ProviderError::Decode {
        details: e.to_string(),
    })?;

    debug!(integration = %integration_type, %user_id, %org_id, "credentials picked up");
    Ok(Json(credentials))
}

/// Loads sample items with posted credentials.
async fn load(
    State(state): State<IntegrationsState>,
    multipart: Multipart,
) -> Result<Json<Vec<IntegrationItem>>, RouteError> {
    let form = FormFields::read(multipart).await?;
    let integration_type = form.integration_type()?;
    let credentials: JsonValue = serde_json::from_str(form.required("credentials")?).map_err(
        |e| ProviderError::InvalidField {
            field: "credentials",
            reason: e.to_string(),
        },
    )?;

    let provider = state.provider(integration_type)?;
    let items = load_items(
        &state.http,
        integration_type,
        provider.api_base_url(),
        &credentials,
    )
    .await?;

    Ok(Json(items))
}

async fn health() -> Json<JsonValue> {
    Json(serde_json::json!({ "status": "ok" }))
}
