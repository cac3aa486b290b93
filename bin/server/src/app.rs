//! Main Leptos application component and routing.

use crate::components::{ClientHandle, IntegrationForm, resolve_base_url};
use crate::state::FormState;
use crate::types::ClientSettings;
use leptos::prelude::*;
use leptos_meta::{Title, provide_meta_context};
use leptos_router::{
    components::{Route, Router, Routes},
    path,
};
use tether_integration::HttpIntegrationsClient;

/// Server function returning the settings the browser needs.
#[server]
pub async fn get_client_settings() -> Result<ClientSettings, ServerFnError> {
    use crate::config::ClientConfig;
    use axum::Extension;

    let Extension(config): Extension<ClientConfig> = leptos_axum::extract().await?;

    Ok(ClientSettings {
        api_base_url: config.api_base_url,
    })
}

/// Main application component.
#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();

    view! {
        <Title text="tether"/>
        <Router>
            <main class="container">
                <Routes fallback=|| "Page not found.".into_view()>
                    <Route path=path!("/") view=HomePage/>
                </Routes>
            </main>
        </Router>
    }
}

/// Home page hosting the integration connect form.
#[component]
fn HomePage() -> impl IntoView {
    let settings = Resource::new(|| (), |_| get_client_settings());

    view! {
        <div class="home-page">
            <h1>"Connect an integration"</h1>
            <Suspense fallback=move || view! { <p>"Loading..."</p> }>
                {move || {
                    settings.get().map(|result| {
                        match result {
                            Ok(settings) => view! { <ConnectForm settings/> }.into_any(),
                            Err(_) => view! {
                                <p class="error">"Failed to load settings."</p>
                            }.into_any(),
                        }
                    })
                }}
            </Suspense>
        </div>
    }
}

/// Builds the API client and the form state, then renders the form.
#[component]
fn ConnectForm(settings: ClientSettings) -> impl IntoView {
    let base_url = resolve_base_url(&settings);

    match HttpIntegrationsClient::new(&base_url) {
        Ok(client) => {
            let form = FormState::new();
            let client: ClientHandle = StoredValue::new_local(client);
            view! { <IntegrationForm form client/> }.into_any()
        }
        Err(err) => view! {
            <p class="error">{format!("Integrations service unavailable: {}", err.detail())}</p>
        }
        .into_any(),
    }
}
