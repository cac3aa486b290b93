//! Static display configuration for each integration.

use tether_core::IntegrationType;

/// How an integration is presented in the form and its consent popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrationConfig {
    pub integration_type: IntegrationType,
    /// Human-readable name used in button labels and messages.
    pub display_name: &'static str,
    /// Browser window name the consent popup is opened under.
    pub window_name: &'static str,
    /// One-line description shown in the type picker.
    pub description: &'static str,
}

const CONFIGS: [IntegrationConfig; 3] = [
    IntegrationConfig {
        integration_type: IntegrationType::Hubspot,
        display_name: "HubSpot",
        window_name: "HubSpot Integration",
        description: "Load contacts from your HubSpot CRM",
    },
    IntegrationConfig {
        integration_type: IntegrationType::Airtable,
        display_name: "Airtable",
        window_name: "Airtable Integration",
        description: "Load bases and tables from Airtable",
    },
    IntegrationConfig {
        integration_type: IntegrationType::Notion,
        display_name: "Notion",
        window_name: "Notion Integration",
        description: "Load pages and databases shared with Notion",
    },
];

/// Returns the configuration for an integration.
#[must_use]
pub fn integration_config(integration_type: IntegrationType) -> &'static IntegrationConfig {
    match integration_type {
        IntegrationType::Hubspot => &CONFIGS[0],
        IntegrationType::Airtable => &CONFIGS[1],
        IntegrationType::Notion => &CONFIGS[2],
    }
}

/// Returns every integration configuration in picker order.
#[must_use]
pub fn all_integrations() -> &'static [IntegrationConfig] {
    &CONFIGS
}

/// Returns the integrations whose key, name or description contains `filter`.
///
/// Matching is case-insensitive; an empty filter matches everything.
pub fn filter_integrations(filter: &str) -> impl Iterator<Item = &'static IntegrationConfig> {
    let filter = filter.trim().to_lowercase();
    CONFIGS.iter().filter(move |config| {
        filter.is_empty()
            || config.integration_type.as_str().contains(&filter)
            || config.display_name.to_lowercase().contains(&filter)
            || config.description.to_lowercase().contains(&filter)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_config() {
        for t in IntegrationType::ALL {
            assert_eq!(integration_config(t).integration_type, t);
        }
        assert_eq!(all_integrations().len(), IntegrationType::ALL.len());
    }

    #[test]
    fn selecting_type_yields_names() {
        let config = integration_config(IntegrationType::Hubspot);
        assert_eq!(config.display_name, "HubSpot");
        assert_eq!(config.window_name, "HubSpot Integration");
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let found: Vec<_> = filter_integrations("AIR")
            .map(|c| c.integration_type)
            .collect();
        assert_eq!(found, vec![IntegrationType::Airtable]);
    }

    #[test]
    fn empty_filter_matches_all() {
        assert_eq!(filter_integrations("  ").count(), 3);
    }

    #[test]
    fn unmatched_filter_is_empty() {
        assert_eq!(filter_integrations("salesforce").count(), 0);
    }
}
