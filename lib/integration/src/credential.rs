//! Opaque credentials handed from the handshake to data loading.
//!
//! The shape of a credential bundle is defined by each provider and is never
//! inspected here. Credentials are never written to logs.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tether_core::IntegrationType;

/// A provider-defined credential bundle returned after authorization.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(JsonValue);

impl Credentials {
    /// Wraps a JSON value, returning `None` when it carries nothing.
    ///
    /// `null`, empty objects, empty arrays and empty strings all count as
    /// missing credentials.
    #[must_use]
    pub fn from_json(value: JsonValue) -> Option<Self> {
        is_present(&value).then_some(Self(value))
    }

    /// Returns the underlying JSON value.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    /// Consumes the credentials, returning the JSON value.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        self.0
    }

    /// Encodes the credentials for the `credentials` form field.
    #[must_use]
    pub fn to_form_value(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

fn is_present(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Object(map) => !map.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::String(s) => !s.trim().is_empty(),
        JsonValue::Bool(_) | JsonValue::Number(_) => true,
    }
}

/// Everything the data loading widget needs once a handshake completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationParams {
    pub credentials: Credentials,
    pub integration_type: IntegrationType,
}

impl IntegrationParams {
    /// Creates integration params.
    #[must_use]
    pub fn new(credentials: Credentials, integration_type: IntegrationType) -> Self {
        Self {
            credentials,
            integration_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values_are_missing() {
        assert!(Credentials::from_json(JsonValue::Null).is_none());
        assert!(Credentials::from_json(json!({})).is_none());
        assert!(Credentials::from_json(json!([])).is_none());
        assert!(Credentials::from_json(json!("  ")).is_none());
    }

    #[test]
    fn token_bundle_is_present() {
        let creds = Credentials::from_json(json!({"access_token": "abc", "expires_in": 1800}))
            .expect("present");
        assert_eq!(creds.as_json()["access_token"], "abc");
    }

    #[test]
    fn debug_redacts_contents() {
        let creds = Credentials::from_json(json!({"access_token": "secret"})).expect("present");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn form_value_is_json() {
        let creds = Credentials::from_json(json!({"access_token": "abc"})).expect("present");
        let parsed: JsonValue = serde_json::from_str(&creds.to_form_value()).expect("json");
        assert_eq!(parsed, json!({"access_token": "abc"}));
    }
}
