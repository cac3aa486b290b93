//! Shared types used across server functions and UI components.

use serde::{Deserialize, Serialize};

/// Settings the browser needs to reach the integrations service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Base URL of the integrations service. `None` means "same origin".
    pub api_base_url: Option<String>,
}
