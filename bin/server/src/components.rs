//! UI components for the integration connect form.

mod data_form;
mod integration_form;
mod oauth_integration;

pub use data_form::{DataForm, render_loaded_data};
pub use integration_form::IntegrationForm;
pub use oauth_integration::{OAuthIntegration, connect_label};

use crate::types::ClientSettings;
use leptos::prelude::{LocalStorage, StoredValue};
use tether_integration::{DEFAULT_BASE_URL, HttpIntegrationsClient};

/// The API client shared by the form's widgets.
pub type ClientHandle = StoredValue<HttpIntegrationsClient, LocalStorage>;

/// Picks the integrations service URL for the browser.
///
/// An explicit setting wins; otherwise the service is assumed to live on the
/// page's own origin.
#[must_use]
pub fn resolve_base_url(settings: &ClientSettings) -> String {
    if let Some(url) = settings
        .api_base_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    {
        return url.to_string();
    }

    #[cfg(feature = "hydrate")]
    if let Some(origin) = crate::browser::page_origin() {
        return format!("{origin}/integrations");
    }

    DEFAULT_BASE_URL.to_string()
}

#[cfg(all(test, not(feature = "hydrate")))]
mod tests {
    use super::*;

    #[test]
    fn explicit_base_url_is_trimmed() {
        let settings = ClientSettings {
            api_base_url: Some("  https://api.example.com/integrations ".to_string()),
        };
        assert_eq!(
            resolve_base_url(&settings),
            "https://api.example.com/integrations"
        );
    }

    #[test]
    fn blank_base_url_falls_back_to_default() {
        let settings = ClientSettings {
            api_base_url: Some("   ".to_string()),
        };
        assert_eq!(resolve_base_url(&settings), DEFAULT_BASE_URL);
        assert_eq!(
            resolve_base_url(&ClientSettings::default()),
            DEFAULT_BASE_URL
        );
    }
}
