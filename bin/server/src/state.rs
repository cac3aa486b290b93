//! Form state shared by the connect form and its widgets.
//!
//! [`FormState`] is a bundle of signals. It is `Copy`, so components receive
//! it as a prop instead of looking it up from context.

use leptos::prelude::*;
use std::fmt;
use tether_core::{
    DEFAULT_ORG, DEFAULT_USER, IntegrationType, OrgId, ParseIdError, SessionContext, UserId,
};
use tether_integration::{Credentials, IntegrationParams};

/// Why the current form values cannot be used for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormStateError {
    /// No integration type has been picked.
    NoIntegrationSelected,
    /// The user or organization field is empty.
    InvalidIdentity(ParseIdError),
}

impl fmt::Display for FormStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIntegrationSelected => write!(f, "select an integration type first"),
            Self::InvalidIdentity(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FormStateError {}

impl From<ParseIdError> for FormStateError {
    fn from(err: ParseIdError) -> Self {
        Self::InvalidIdentity(err)
    }
}

/// The form generation a handshake was started in.
///
/// Any change that invalidates a running handshake (another integration, a
/// disconnect, a newer handshake) moves the form to a new generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTicket(u64);

/// User, organization and integration selection plus fetched credentials.
#[derive(Debug, Clone, Copy)]
pub struct FormState {
    pub user_id: RwSignal<String>,
    pub org_id: RwSignal<String>,
    pub integration_type: RwSignal<Option<IntegrationType>>,
    pub integration_params: RwSignal<Option<IntegrationParams>>,
    generation: StoredValue<u64>,
}

impl FormState {
    /// Creates the state with the default identity and nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_id: RwSignal::new(DEFAULT_USER.to_string()),
            org_id: RwSignal::new(DEFAULT_ORG.to_string()),
            integration_type: RwSignal::new(None),
            integration_params: RwSignal::new(None),
            generation: StoredValue::new(0),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.update_value(|generation| *generation = generation.wrapping_add(1));
        self.generation.get_value()
    }

    /// Picks an integration type.
    ///
    /// Credentials belong to one integration, so switching to a different
    /// type drops them.
    pub fn select_integration(&self, integration_type: Option<IntegrationType>) {
        if self.integration_type.get_untracked() == integration_type {
            return;
        }
        self.next_generation();
        self.integration_type.set(integration_type);
        self.integration_params.set(None);
    }

    /// Builds the identity for an integrations request from the form.
    ///
    /// # Errors
    ///
    /// Fails when no integration is selected or an identity field is blank.
    pub fn session_context(&self) -> Result<SessionContext, FormStateError> {
        let integration_type = self
            .integration_type
            .get_untracked()
            .ok_or(FormStateError::NoIntegrationSelected)?;
        let user_id = UserId::new(self.user_id.get_untracked())?;
        let org_id = OrgId::new(self.org_id.get_untracked())?;
        Ok(SessionContext::new(user_id, org_id, integration_type))
    }

    /// Stores the params of a completed handshake.
    pub fn connect(&self, params: IntegrationParams) {
        self.integration_params.set(Some(params));
    }

    /// Starts a new generation for a handshake, making any older one stale.
    pub fn begin_handshake(&self) -> HandshakeTicket {
        HandshakeTicket(self.next_generation())
    }

    /// Whether nothing has changed since `ticket` was issued.
    #[must_use]
    pub fn is_current(&self, ticket: HandshakeTicket) -> bool {
        self.generation.get_value() == ticket.0
    }

    /// Stores the params of the handshake holding `ticket`, unless it went
    /// stale. Returns whether they were stored.
    pub fn finish_handshake(&self, ticket: HandshakeTicket, params: IntegrationParams) -> bool {
        let current = self.is_current(ticket)
            && self.integration_type.get_untracked() == Some(params.integration_type);
        if current {
            self.connect(params);
        }
        current
    }

    /// Forgets the stored credentials and abandons any running handshake.
    pub fn disconnect(&self) {
        self.next_generation();
        self.integration_params.set(None);
    }

    /// The stored credentials, if the selected integration is connected.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.integration_params
            .with(|params| params.as_ref().map(|params| params.credentials.clone()))
    }

    /// Whether the data loading widget may be shown.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.integration_params.with(Option::is_some)
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self::new()
    }
}
