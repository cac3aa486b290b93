//! The `state` parameter carried through the provider redirect.
//!
//! The random token is bundled with the identity it was issued for and
//! encoded as URL-safe base64 JSON, so the callback can find the pending
//! entry without a cookie.

use crate::error::ProviderError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use oauth2::CsrfToken;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use tether_core::{OrgId, UserId};

/// State issued by `authorize` and returned to `oauth2callback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    /// Random anti-forgery token.
    pub state: String,
    pub user_id: UserId,
    pub org_id: OrgId,
}

impl OAuthState {
    /// Issues a fresh state for an identity.
    #[must_use]
    pub fn generate(user_id: UserId, org_id: OrgId) -> Self {
        Self {
            state: CsrfToken::new_random().secret().clone(),
            user_id,
            org_id,
        }
    }

    /// Encodes the state for the `state` query parameter.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing plain strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a `state` query parameter.
    ///
    /// Padded input is accepted as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not base64 JSON of the right shape.
    pub fn decode(encoded: &str) -> Result<Self, Report<ProviderError>> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| ProviderError::MalformedState {
                reason: e.to_string(),
            })?;

        Ok(
            serde_json::from_slice(&bytes).map_err(|e| ProviderError::MalformedState {
                reason: e.to_string(),
            })?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;

    fn identity() -> (UserId, OrgId) {
        (
            UserId::new("TestUser").expect("user"),
            OrgId::new("TestOrg").expect("org"),
        )
    }

    #[test]
    fn encoded_state_decodes_to_same_identity() {
        let (user_id, org_id) = identity();
        let state = OAuthState::generate(user_id, org_id);

        let encoded = state.encode();
        assert!(!encoded.contains('='));
        assert_eq!(OAuthState::decode(&encoded).expect("decode"), state);
    }

    #[test]
    fn generated_tokens_differ() {
        let (user_id, org_id) = identity();
        let first = OAuthState::generate(user_id.clone(), org_id.clone());
        let second = OAuthState::generate(user_id, org_id);
        assert_ne!(first.state, second.state);
    }

    #[test]
    fn padded_state_is_accepted() {
        let json = r#"{"state":"abc","user_id":"u","org_id":"o"}"#;
        let padded = URL_SAFE.encode(json);

        let state = OAuthState::decode(&padded).expect("decode");
        assert_eq!(state.state, "abc");
        assert_eq!(state.user_id.as_str(), "u");
    }

    #[test]
    fn garbage_is_malformed() {
        let err = OAuthState::decode("not base64 at all!").expect_err("should fail");
        assert!(matches!(
            err.current_context(),
            ProviderError::MalformedState { .. }
        ));

        let not_json = URL_SAFE_NO_PAD.encode("plain text");
        assert!(OAuthState::decode(&not_json).is_err());
    }

    #[test]
    fn empty_identity_is_rejected() {
        let json = r#"{"state":"abc","user_id":"","org_id":"o"}"#;
        assert!(OAuthState::decode(&URL_SAFE_NO_PAD.encode(json)).is_err());
    }
}
