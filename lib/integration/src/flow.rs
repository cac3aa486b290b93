//! Drives a [`Handshake`] against the API client, a popup and a timer.
//!
//! The browser specifics live behind [`PopupOpener`], [`PopupWindow`],
//! [`Sleeper`] and [`Clock`] so the same sequence runs in the UI and in tests.

use crate::client::IntegrationsApi;
use crate::credential::IntegrationParams;
use crate::error::HandshakeError;
use crate::handshake::{Handshake, HandshakeState, PollOutcome, PopupRequest};
use async_trait::async_trait;
use std::time::Duration;
use tether_core::SessionContext;
use tracing::{debug, info, warn};

/// An open consent popup.
pub trait PopupWindow {
    /// Whether the popup has been closed (or can no longer be observed).
    fn is_closed(&self) -> bool;

    /// Closes the popup if it is still open.
    fn close(&self);
}

/// Opens consent popups.
pub trait PopupOpener {
    type Window: PopupWindow;

    /// Opens a popup, returning `None` if the browser refused.
    fn open(&self, request: &PopupRequest) -> Option<Self::Window>;
}

/// Waits between popup closure checks.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Monotonic time source for the popup timeout.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Runs the authorize → popup → poll → credentials sequence.
pub struct HandshakeDriver<'a, A: ?Sized, O, S> {
    api: &'a A,
    opener: &'a O,
    timer: &'a S,
    cancelled: Option<&'a dyn Fn() -> bool>,
}

impl<'a, A, O, S> HandshakeDriver<'a, A, O, S>
where
    A: IntegrationsApi + ?Sized,
    O: PopupOpener,
    S: Sleeper + Clock,
{
    /// Creates a driver. `timer` both paces the closure checks and measures
    /// how long the popup has been open.
    #[must_use]
    pub fn new(api: &'a A, opener: &'a O, timer: &'a S) -> Self {
        Self {
            api,
            opener,
            timer,
            cancelled: None,
        }
    }

    /// Stops the handshake with [`HandshakeError::Cancelled`] once
    /// `cancelled` returns true.
    ///
    /// It is checked before the popup opens, before every closure check and
    /// once credentials arrive. A cancelled handshake leaves the popup alone
    /// since a newer handshake may have reused the window.
    #[must_use]
    pub fn cancel_when(mut self, cancelled: &'a dyn Fn() -> bool) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.is_some_and(|cancelled| cancelled())
    }

    /// Runs one handshake to completion.
    ///
    /// `observe` is called after every state change so a UI can mirror the
    /// handshake. Exactly one authorize call precedes the popup and exactly
    /// one credentials call follows its closure.
    ///
    /// # Errors
    ///
    /// Returns the error the handshake failed with; the handshake is left in
    /// the matching `Failed` state.
    pub async fn run(
        &self,
        handshake: &mut Handshake,
        context: &SessionContext,
        mut observe: impl FnMut(&HandshakeState),
    ) -> Result<IntegrationParams, HandshakeError> {
        let integration = context.integration_type;

        handshake.begin()?;
        observe(handshake.state());
        info!(%integration, user_id = %context.user_id, org_id = %context.org_id, "starting OAuth handshake");

        let url = match self.api.authorize(context).await {
            Ok(url) => url,
            Err(source) => {
                warn!(%integration, error = %source, "authorize call failed");
                return Err(Self::failed(
                    handshake,
                    HandshakeError::AuthorizeFailed { source },
                    &mut observe,
                ));
            }
        };

        if self.is_cancelled() {
            return Err(Self::cancel(handshake, &mut observe));
        }

        let request = handshake.authorized(url)?;
        observe(handshake.state());

        let Some(popup) = self.opener.open(&request) else {
            warn!(%integration, window = request.window_name, "consent popup was blocked");
            return Err(Self::failed(
                handshake,
                HandshakeError::PopupBlocked,
                &mut observe,
            ));
        };
        debug!(%integration, window = request.window_name, "consent popup opened");

        let interval = handshake.schedule().interval;
        let opened_at = self.timer.now();
        loop {
            self.timer.sleep(interval).await;
            if self.is_cancelled() {
                return Err(Self::cancel(handshake, &mut observe));
            }
            let elapsed = self.timer.now().saturating_sub(opened_at);
            match handshake.popup_polled(popup.is_closed(), elapsed)? {
                PollOutcome::KeepPolling => {}
                PollOutcome::Closed => break,
                PollOutcome::TimedOut => {
                    popup.close();
                    observe(handshake.state());
                    warn!(%integration, ?elapsed, "consent popup timed out");
                    return Err(handshake
                        .state()
                        .error()
                        .cloned()
                        .unwrap_or(HandshakeError::IncompleteAuthorization));
                }
            }
        }
        observe(handshake.state());
        debug!(%integration, "consent popup closed, retrieving credentials");

        let credentials = match self.api.get_credentials(context).await {
            Ok(credentials) => credentials,
            Err(source) => {
                warn!(%integration, error = %source, "credentials call failed");
                return Err(Self::failed(
                    handshake,
                    HandshakeError::CredentialsFailed { source },
                    &mut observe,
                ));
            }
        };

        if self.is_cancelled() {
            return Err(Self::cancel(handshake, &mut observe));
        }

        let result = handshake.credentials_received(credentials);
        observe(handshake.state());
        match &result {
            Ok(_) => info!(%integration, "integration connected"),
            Err(error) => warn!(%integration, %error, "handshake ended without credentials"),
        }
        result
    }

    fn cancel(
        handshake: &mut Handshake,
        observe: &mut impl FnMut(&HandshakeState),
    ) -> HandshakeError {
        debug!(integration = %handshake.integration_type(), "handshake cancelled");
        Self::failed(handshake, HandshakeError::Cancelled, observe)
    }

    fn failed(
        handshake: &mut Handshake,
        error: HandshakeError,
        observe: &mut impl FnMut(&HandshakeState),
    ) -> HandshakeError {
        handshake.fail(error.clone());
        observe(handshake.state());
        error
    }
}
