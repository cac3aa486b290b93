//! The third-party services a user can connect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An integration that can be authorized through the OAuth popup flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationType {
    /// HubSpot CRM.
    Hubspot,
    /// Airtable bases.
    Airtable,
    /// Notion workspaces.
    Notion,
}

impl IntegrationType {
    /// Every supported integration, in picker order.
    pub const ALL: [IntegrationType; 3] = [Self::Hubspot, Self::Airtable, Self::Notion];

    /// Returns the wire key for this integration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hubspot => "hubspot",
            Self::Airtable => "airtable",
            Self::Notion => "notion",
        }
    }

    /// Returns the form field name the integration type is sent as.
    #[must_use]
    pub const fn field_name() -> &'static str {
        "integration_type"
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown integration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIntegrationTypeError {
    /// The rejected key.
    pub value: String,
}

impl fmt::Display for ParseIntegrationTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown integration type '{}'", self.value)
    }
}

impl std::error::Error for ParseIntegrationTypeError {}

impl FromStr for IntegrationType {
    type Err = ParseIntegrationTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| ParseIntegrationTypeError {
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("HubSpot".parse::<IntegrationType>(), Ok(IntegrationType::Hubspot));
        assert_eq!(" notion ".parse::<IntegrationType>(), Ok(IntegrationType::Notion));
    }

    #[test]
    fn parse_unknown() {
        let err = "salesforce".parse::<IntegrationType>().unwrap_err();
        assert_eq!(err.value, "salesforce");
        assert!(err.to_string().contains("salesforce"));
    }

    #[test]
    fn display_matches_wire_key() {
        for t in IntegrationType::ALL {
            assert_eq!(t.to_string(), t.as_str());
            assert_eq!(t.as_str().parse::<IntegrationType>(), Ok(t));
        }
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&IntegrationType::Airtable).expect("serialize");
        assert_eq!(json, "\"airtable\"");
    }
}
