//! The data loading widget.

use super::ClientHandle;
use crate::state::FormState;
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde_json::Value as JsonValue;
use tether_integration::{IntegrationsApi, integration_config};

/// Formats loaded data for the read-only text area.
#[must_use]
pub fn render_loaded_data(data: Option<&JsonValue>) -> String {
    match data {
        None => String::new(),
        Some(data) => serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
    }
}

/// Loads sample data with the stored credentials and shows it.
///
/// Only rendered while credentials are present.
#[component]
pub fn DataForm(form: FormState, client: ClientHandle) -> impl IntoView {
    let (loaded, set_loaded) = signal(Option::<JsonValue>::None);
    let (loading, set_loading) = signal(false);
    let (error, set_error) = signal(Option::<String>::None);

    let on_load = move |_| {
        let Some(params) = form.integration_params.get_untracked() else {
            return;
        };
        let display_name = integration_config(params.integration_type).display_name;
        let client = client.get_value();

        set_loading.set(true);
        set_error.set(None);
        spawn_local(async move {
            match client
                .load_data(params.integration_type, &params.credentials)
                .await
            {
                Ok(data) => set_loaded.set(Some(data)),
                Err(err) => set_error.set(Some(format!(
                    "Failed to load {display_name} data: {}",
                    err.detail()
                ))),
            }
            set_loading.set(false);
        });
    };

    let on_clear = move |_| {
        set_loaded.set(None);
        set_error.set(None);
    };

    view! {
        <div class="data-form">
            <label for="loaded-data">"Loaded Data"</label>
            <textarea
                id="loaded-data"
                readonly
                rows="16"
                prop:value=move || loaded.with(|data| render_loaded_data(data.as_ref()))
            ></textarea>
            <div class="actions-bar">
                <button
                    class="primary-btn"
                    disabled=move || loading.get()
                    on:click=on_load
                >
                    {move || if loading.get() { "Loading..." } else { "Load Data" }}
                </button>
                <button class="secondary-btn" on:click=on_clear>"Clear Data"</button>
            </div>
            {move || error.get().map(|message| view! { <p class="error">{message}</p> })}
        </div>
    }
}
