//! Error types for the integration crate.
//!
//! - `ApiError`: Errors from calls to the backend integrations service
//! - `HandshakeError`: Errors that end an OAuth popup handshake

use std::fmt;
use std::time::Duration;

/// Errors from the integrations API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The configured base URL could not be used.
    InvalidBaseUrl { url: String, reason: String },
    /// The request never produced a response.
    Transport { endpoint: String, reason: String },
    /// The backend answered with an error status.
    Backend {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },
    /// The response body could not be interpreted.
    Decode { endpoint: String, reason: String },
}

impl ApiError {
    /// Returns the message to show the user.
    ///
    /// Backend errors carry the `detail` the service sent; everything else
    /// falls back to a short description.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Backend {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Backend { status, .. } => format!("request failed with status {status}"),
            Self::Transport { reason, .. } => reason.clone(),
            Self::Decode { reason, .. } => format!("unexpected response: {reason}"),
            Self::InvalidBaseUrl { reason, .. } => format!("invalid service URL: {reason}"),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl { url, reason } => {
                write!(f, "invalid base URL '{url}': {reason}")
            }
            Self::Transport { endpoint, reason } => {
                write!(f, "request to '{endpoint}' failed: {reason}")
            }
            Self::Backend {
                endpoint,
                status,
                detail,
            } => match detail {
                Some(detail) => write!(f, "'{endpoint}' returned {status}: {detail}"),
                None => write!(f, "'{endpoint}' returned {status}"),
            },
            Self::Decode { endpoint, reason } => {
                write!(f, "could not decode response from '{endpoint}': {reason}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Errors that end an OAuth popup handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// An event arrived in a state that cannot accept it.
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    /// The authorization URL could not be obtained.
    AuthorizeFailed { source: ApiError },
    /// The browser refused to open the consent window.
    PopupBlocked,
    /// The consent window stayed open past the poll timeout.
    PopupTimedOut { waited: Duration },
    /// The credentials lookup failed.
    CredentialsFailed { source: ApiError },
    /// The consent window closed but no credentials were stored.
    IncompleteAuthorization,
    /// The form moved on (another integration, a disconnect) before the
    /// handshake finished.
    Cancelled,
}

impl HandshakeError {
    /// Returns the message to show the user for the given integration.
    #[must_use]
    pub fn user_message(&self, display_name: &str) -> String {
        match self {
            Self::AuthorizeFailed { source } => {
                format!("Failed to connect to {display_name}: {}", source.detail())
            }
            Self::CredentialsFailed { source } => {
                format!(
                    "Failed to retrieve {display_name} credentials: {}",
                    source.detail()
                )
            }
            Self::PopupBlocked => {
                format!("The {display_name} consent window was blocked by the browser")
            }
            Self::PopupTimedOut { .. } => {
                format!("Timed out waiting for the {display_name} consent window")
            }
            Self::IncompleteAuthorization => {
                format!("{display_name} authorization was not completed")
            }
            Self::InvalidTransition { .. } => {
                format!("A {display_name} connection is already in progress")
            }
            Self::Cancelled => format!("The {display_name} connection was cancelled"),
        }
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { state, event } => {
                write!(f, "cannot handle '{event}' while {state}")
            }
            Self::AuthorizeFailed { source } => write!(f, "authorization failed: {source}"),
            Self::PopupBlocked => write!(f, "consent popup was blocked"),
            Self::PopupTimedOut { waited } => {
                write!(f, "consent popup still open after {waited:?}")
            }
            Self::CredentialsFailed { source } => {
                write!(f, "credential retrieval failed: {source}")
            }
            Self::IncompleteAuthorization => {
                write!(f, "consent popup closed without credentials")
            }
            Self::Cancelled => write!(f, "handshake cancelled"),
        }
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AuthorizeFailed { source } | Self::CredentialsFailed { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(detail: Option<&str>) -> ApiError {
        ApiError::Backend {
            endpoint: "http://localhost:3000/integrations/authorize".to_string(),
            status: 400,
            detail: detail.map(str::to_string),
        }
    }

    #[test]
    fn backend_detail_is_shown_to_user() {
        let err = HandshakeError::AuthorizeFailed {
            source: backend(Some("Invalid integration type")),
        };
        assert_eq!(
            err.user_message("HubSpot"),
            "Failed to connect to HubSpot: Invalid integration type"
        );
    }

    #[test]
    fn backend_without_detail_falls_back_to_status() {
        let err = backend(None);
        assert_eq!(err.detail(), "request failed with status 400");
        assert!(err.to_string().contains("returned 400"));
    }

    #[test]
    fn credentials_failure_message() {
        let err = HandshakeError::CredentialsFailed {
            source: backend(Some("No credentials found.")),
        };
        assert_eq!(
            err.user_message("Notion"),
            "Failed to retrieve Notion credentials: No credentials found."
        );
    }

    #[test]
    fn timeout_display() {
        let err = HandshakeError::PopupTimedOut {
            waited: Duration::from_secs(600),
        };
        assert!(err.to_string().contains("600s"));
    }

    #[test]
    fn short_timeout_display_keeps_milliseconds() {
        let err = HandshakeError::PopupTimedOut {
            waited: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "consent popup still open after 250ms");
    }

    #[test]
    fn source_chain() {
        use std::error::Error;

        let err = HandshakeError::CredentialsFailed {
            source: backend(Some("boom")),
        };
        assert!(err.source().is_some());
        assert!(HandshakeError::PopupBlocked.source().is_none());
    }
}
