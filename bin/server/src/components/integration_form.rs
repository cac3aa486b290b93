//! The connect form: identity fields and the integration type picker.

use super::{ClientHandle, DataForm, OAuthIntegration};
use crate::state::FormState;
use leptos::prelude::*;
use tether_integration::filter_integrations;

/// Form for picking an identity and an integration to connect.
///
/// The handshake widget appears once a type is picked and the data widget
/// once credentials are present.
#[component]
pub fn IntegrationForm(form: FormState, client: ClientHandle) -> impl IntoView {
    let (type_filter, set_type_filter) = signal(String::new());

    view! {
        <div class="integration-form">
            <div class="form-group">
                <label for="user-id">"User"</label>
                <input
                    id="user-id"
                    type="text"
                    prop:value=move || form.user_id.get()
                    on:input=move |ev| form.user_id.set(event_target_value(&ev))
                />
            </div>

            <div class="form-group">
                <label for="org-id">"Organization"</label>
                <input
                    id="org-id"
                    type="text"
                    prop:value=move || form.org_id.get()
                    on:input=move |ev| form.org_id.set(event_target_value(&ev))
                />
            </div>

            <div class="form-group">
                <label>"Integration Type"</label>
                <input
                    type="text"
                    class="type-filter"
                    placeholder="Search integrations..."
                    prop:value=move || type_filter.get()
                    on:input=move |ev| set_type_filter.set(event_target_value(&ev))
                />
                <div class="type-picker">
                    {move || {
                        let filter = type_filter.get();
                        let selected = form.integration_type.get();
                        filter_integrations(&filter)
                            .map(|config| {
                                let integration_type = config.integration_type;
                                let is_selected = selected == Some(integration_type);
                                view! {
                                    <div
                                        class="type-option"
                                        class:selected=is_selected
                                        on:click=move |_| {
                                            // Clicking the selected option clears the choice.
                                            let next = (!is_selected).then_some(integration_type);
                                            form.select_integration(next);
                                        }
                                    >
                                        <strong>{config.display_name}</strong>
                                        <span class="type-desc">{config.description}</span>
                                    </div>
                                }
                            })
                            .collect_view()
                    }}
                </div>
            </div>

            {move || form.integration_type.get().map(|integration_type| view! {
                <OAuthIntegration form client integration_type/>
            })}

            {move || form.is_connected().then(|| view! {
                <DataForm form client/>
            })}
        </div>
    }
}

#[cfg(all(test, feature = "ssr"))]
mod tests {
    use super::*;
    use leptos::tachys::view::RenderHtml;
    use serde_json::json;
    use tether_core::IntegrationType;
    use tether_integration::{Credentials, HttpIntegrationsClient, IntegrationParams};

    fn render(form: FormState) -> String {
        let client: ClientHandle = StoredValue::new_local(
            HttpIntegrationsClient::new("http://localhost:3000/integrations").expect("client"),
        );
        view! { <IntegrationForm form client/> }.to_html()
    }

    fn with_owner<T>(f: impl FnOnce() -> T) -> T {
        let owner = Owner::new();
        owner.set();
        f()
    }

    #[test]
    fn nothing_selected_shows_only_the_picker() {
        with_owner(|| {
            let html = render(FormState::new());
            assert!(html.contains("HubSpot"));
            assert!(!html.contains("oauth-integration"));
            assert!(!html.contains("data-form"));
        });
    }

    #[test]
    fn selected_but_not_connected_hides_data_widget() {
        with_owner(|| {
            let form = FormState::new();
            form.select_integration(Some(IntegrationType::Notion));

            let html = render(form);
            assert!(html.contains("Connect to Notion"));
            assert!(!html.contains("data-form"));
        });
    }

    #[test]
    fn connected_shows_data_widget() {
        with_owner(|| {
            let form = FormState::new();
            form.select_integration(Some(IntegrationType::Notion));
            let credentials =
                Credentials::from_json(json!({"access_token": "abc"})).expect("credentials");
            form.connect(IntegrationParams::new(credentials, IntegrationType::Notion));

            let html = render(form);
            assert!(html.contains("Notion Connected"));
            assert!(html.contains("data-form"));
            assert!(html.contains("Load Data"));
        });
    }
}
