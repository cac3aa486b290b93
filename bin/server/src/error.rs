//! Error types for the integrations service.
//!
//! Provider and store operations return `Report<ProviderError>`; handlers
//! wrap it in [`RouteError`], which maps it to a status code and a
//! `{"detail": ...}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rootcause::prelude::Report;
use std::fmt;
use tether_core::IntegrationType;
use tether_integration::integration_config;

/// Errors raised while brokering provider OAuth or loading provider data.
#[derive(Debug)]
pub enum ProviderError {
    /// The request named an integration that does not exist.
    InvalidIntegrationType { value: String },
    /// A required request field was missing.
    MissingField { field: &'static str },
    /// A request field could not be parsed.
    InvalidField { field: &'static str, reason: String },
    /// The provider has no client ID or secret configured.
    NotConfigured { integration: IntegrationType },
    /// Provider configuration is present but unusable.
    Configuration { details: String },
    /// The provider redirected back with an error.
    ProviderDenied { description: String },
    /// The callback state could not be decoded.
    MalformedState { reason: String },
    /// The callback state does not match the pending one.
    StateMismatch,
    /// Exchanging the authorization code failed.
    TokenExchange { details: String },
    /// No credentials are waiting for this identity.
    NoCredentials,
    /// The stored credentials carry no access token.
    MissingAccessToken,
    /// The provider API answered with an error status.
    Upstream { status: u16, body: String },
    /// The provider API could not be reached.
    Transport { details: String },
    /// The provider API answered with an unexpected body.
    Decode { details: String },
}

impl ProviderError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidIntegrationType { .. }
            | Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::ProviderDenied { .. }
            | Self::MalformedState { .. }
            | Self::StateMismatch
            | Self::NoCredentials
            | Self::MissingAccessToken => StatusCode::BAD_REQUEST,
            Self::NotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::TokenExchange { .. } | Self::Transport { .. } | Self::Decode { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Returns the message sent to the caller.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidIntegrationType { .. } => "Invalid integration type".to_string(),
            Self::MissingField { field } => format!("Missing field: {field}"),
            Self::InvalidField { field, reason } => format!("Invalid {field}: {reason}"),
            Self::NotConfigured { integration } => {
                let name = integration_config(*integration).display_name;
                format!("{name} integration is not configured")
            }
            Self::Configuration { .. } => "Configuration error".to_string(),
            Self::ProviderDenied { description } => description.clone(),
            Self::MalformedState { .. } | Self::StateMismatch => {
                "State does not match.".to_string()
            }
            Self::TokenExchange { details } => details.clone(),
            Self::NoCredentials => "No credentials found.".to_string(),
            Self::MissingAccessToken => "Credentials have no access token.".to_string(),
            Self::Upstream { body, .. } => body.clone(),
            Self::Transport { .. } => "Provider is unreachable".to_string(),
            Self::Decode { .. } => "Provider returned an unexpected response".to_string(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIntegrationType { value } => {
                write!(f, "invalid integration type '{}'", value)
            }
            Self::MissingField { field } => write!(f, "missing form field '{}'", field),
            Self::InvalidField { field, reason } => {
                write!(f, "invalid form field '{}': {}", field, reason)
            }
            Self::NotConfigured { integration } => {
                write!(f, "{} OAuth is not configured", integration)
            }
            Self::Configuration { details } => write!(f, "configuration error: {}", details),
            Self::ProviderDenied { description } => {
                write!(f, "provider denied authorization: {}", description)
            }
            Self::MalformedState { reason } => write!(f, "malformed OAuth state: {}", reason),
            Self::StateMismatch => write!(f, "OAuth state mismatch"),
            Self::TokenExchange { details } => write!(f, "token exchange failed: {}", details),
            Self::NoCredentials => write!(f, "no pending credentials"),
            Self::MissingAccessToken => write!(f, "credentials have no access token"),
            Self::Upstream { status, body } => {
                write!(f, "provider returned {}: {}", status, body)
            }
            Self::Transport { details } => write!(f, "provider request failed: {}", details),
            Self::Decode { details } => {
                write!(f, "could not decode provider response: {}", details)
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Handler error carrying a provider report.
#[derive(Debug)]
pub struct RouteError(Report<ProviderError>);

impl RouteError {
    /// The error this report was raised with.
    #[must_use]
    pub fn error(&self) -> &ProviderError {
        self.0.current_context()
    }
}

impl From<Report<ProviderError>> for RouteError {
    fn from(report: Report<ProviderError>) -> Self {
        Self(report)
    }
}

impl From<ProviderError> for RouteError {
    fn from(error: ProviderError) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let error = self.error();
        let status = error.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "integrations request failed");
        } else {
            tracing::warn!(error = %self.0, "integrations request rejected");
        }

        (
            status,
            Json(serde_json::json!({ "detail": error.detail() })),
        )
            .into_response()
    }
}
