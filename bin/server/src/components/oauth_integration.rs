//! The OAuth handshake widget.

use super::ClientHandle;
use crate::state::{FormState, HandshakeTicket};
use leptos::prelude::*;
use tether_core::{IntegrationType, SessionContext};
use tether_integration::{HandshakeState, HttpIntegrationsClient, integration_config};

/// Returns the connect button label.
#[must_use]
pub fn connect_label(display_name: &str, connected: bool, connecting: bool) -> String {
    if connected {
        format!("{display_name} Connected")
    } else if connecting {
        "Connecting...".to_string()
    } else {
        format!("Connect to {display_name}")
    }
}

/// Button that runs the OAuth popup handshake for one integration.
#[component]
pub fn OAuthIntegration(
    form: FormState,
    client: ClientHandle,
    integration_type: IntegrationType,
) -> impl IntoView {
    let config = integration_config(integration_type);
    let status = RwSignal::new(HandshakeState::Idle);
    let (form_error, set_form_error) = signal(Option::<String>::None);

    let on_connect = move |_| {
        if form.is_connected() || !status.with_untracked(HandshakeState::can_begin) {
            return;
        }
        set_form_error.set(None);
        match form.session_context() {
            Ok(context) => {
                let ticket = form.begin_handshake();
                start_handshake(client.get_value(), context, form, status, ticket);
            }
            Err(err) => set_form_error.set(Some(err.to_string())),
        }
    };

    let on_disconnect = move |_| {
        form.disconnect();
        status.set(HandshakeState::Idle);
    };

    view! {
        <div class="oauth-integration">
            <button
                class="primary-btn"
                class:connected=move || form.is_connected()
                disabled=move || form.is_connected() || status.with(HandshakeState::is_connecting)
                on:click=on_connect
            >
                {move || connect_label(
                    config.display_name,
                    form.is_connected(),
                    status.with(HandshakeState::is_connecting),
                )}
            </button>
            {move || form.is_connected().then(|| view! {
                <button class="secondary-btn" on:click=on_disconnect>"Disconnect"</button>
            })}
            {move || {
                status
                    .with(|state| state.error().map(|err| err.user_message(config.display_name)))
                    .or_else(|| form_error.get())
                    .map(|message| view! { <p class="error">{message}</p> })
            }}
        </div>
    }
}

#[cfg(feature = "hydrate")]
fn start_handshake(
    client: HttpIntegrationsClient,
    context: SessionContext,
    form: FormState,
    status: RwSignal<HandshakeState>,
    ticket: HandshakeTicket,
) {
    crate::browser::spawn_handshake(client, context, form, status, ticket);
}

// Popups only exist in the browser.
#[cfg(not(feature = "hydrate"))]
fn start_handshake(
    _client: HttpIntegrationsClient,
    _context: SessionContext,
    _form: FormState,
    _status: RwSignal<HandshakeState>,
    _ticket: HandshakeTicket,
) {
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_follows_handshake_progress() {
        assert_eq!(connect_label("HubSpot", false, false), "Connect to HubSpot");
        assert_eq!(connect_label("HubSpot", false, true), "Connecting...");
        assert_eq!(connect_label("HubSpot", true, false), "HubSpot Connected");
    }

    #[test]
    fn connected_wins_over_connecting() {
        assert_eq!(connect_label("Notion", true, true), "Notion Connected");
    }
}
