//! OAuth popup handshake state machine.
//!
//! A handshake moves through
//!
//! ```text
//! Idle -> Connecting -> AwaitingPopupClosure -> RetrievingCredentials -> Connected
//! ```
//!
//! and lands in `Failed` when any step goes wrong. Popup closure is the only
//! signal the browser gives, so a closed popup means either a completed or an
//! abandoned consent; the credentials lookup decides which.
//!
//! The machine performs no I/O. [`crate::flow`] drives it against the API
//! client, the browser popup and a timer.

use crate::credential::{Credentials, IntegrationParams};
use crate::error::HandshakeError;
use crate::registry::integration_config;
use reqwest::Url;
use std::time::Duration;
use tether_core::IntegrationType;

/// Width of the consent popup in CSS pixels.
pub const POPUP_WIDTH: u32 = 600;

/// Height of the consent popup in CSS pixels.
pub const POPUP_HEIGHT: u32 = 600;

/// How often and for how long the popup is polled for closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Delay between two closure checks.
    pub interval: Duration,
    /// Total wall-clock time to wait for the popup to close.
    pub timeout: Duration,
}

impl PollSchedule {
    /// Default delay between closure checks.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

    /// Default wait; matches the lifetime of the backend's pending OAuth state.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    /// Creates a schedule. A zero interval is raised to one millisecond.
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            timeout,
        }
    }

    /// Whether a popup open for `elapsed` has outlived the schedule.
    #[must_use]
    pub fn is_expired(&self, elapsed: Duration) -> bool {
        elapsed >= self.timeout
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_TIMEOUT)
    }
}

/// A request to open the provider consent popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRequest {
    pub url: Url,
    pub window_name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl PopupRequest {
    /// Returns the `window.open` feature string.
    #[must_use]
    pub fn features(&self) -> String {
        format!("width={},height={}", self.width, self.height)
    }
}

/// Where a handshake currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// Waiting for the authorization URL.
    Connecting,
    /// The consent popup is open.
    AwaitingPopupClosure {
        /// Open-popup observations so far.
        polls: u32,
    },
    /// The popup closed; waiting for the credentials lookup.
    RetrievingCredentials,
    /// Credentials were obtained.
    Connected,
    /// The handshake ended without credentials.
    Failed(HandshakeError),
}

impl HandshakeState {
    /// Returns a short name for logs and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingPopupClosure { .. } => "awaiting popup closure",
            Self::RetrievingCredentials => "retrieving credentials",
            Self::Connected => "connected",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether a handshake is in flight.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingPopupClosure { .. } | Self::RetrievingCredentials
        )
    }

    /// Whether credentials were obtained.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a new handshake may start from this state.
    #[must_use]
    pub fn can_begin(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed(_))
    }

    /// Returns the failure, if the handshake failed.
    #[must_use]
    pub fn error(&self) -> Option<&HandshakeError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of one popup closure check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The popup is still open; check again after the interval.
    KeepPolling,
    /// The popup closed; stop polling and fetch credentials.
    Closed,
    /// The popup outlived the timeout; the handshake has failed.
    TimedOut,
}

/// The handshake state machine for one integration.
#[derive(Debug, Clone)]
pub struct Handshake {
    integration_type: IntegrationType,
    schedule: PollSchedule,
    state: HandshakeState,
}

impl Handshake {
    /// Creates an idle handshake.
    #[must_use]
    pub fn new(integration_type: IntegrationType, schedule: PollSchedule) -> Self {
        Self {
            integration_type,
            schedule,
            state: HandshakeState::Idle,
        }
    }

    /// Returns the integration being connected.
    #[must_use]
    pub fn integration_type(&self) -> IntegrationType {
        self.integration_type
    }

    /// Returns the poll schedule.
    #[must_use]
    pub fn schedule(&self) -> PollSchedule {
        self.schedule
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    fn reject(&self, event: &'static str) -> HandshakeError {
        HandshakeError::InvalidTransition {
            state: self.state.name(),
            event,
        }
    }

    /// Starts a handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if a handshake is in flight or already connected.
    pub fn begin(&mut self) -> Result<(), HandshakeError> {
        if !self.state.can_begin() {
            return Err(self.reject("begin"));
        }
        self.state = HandshakeState::Connecting;
        Ok(())
    }

    /// Records the authorization URL and returns the popup to open.
    ///
    /// # Errors
    ///
    /// Returns an error unless the handshake is connecting.
    pub fn authorized(&mut self, url: Url) -> Result<PopupRequest, HandshakeError> {
        if self.state != HandshakeState::Connecting {
            return Err(self.reject("authorized"));
        }
        self.state = HandshakeState::AwaitingPopupClosure { polls: 0 };

        Ok(PopupRequest {
            url,
            window_name: integration_config(self.integration_type).window_name,
            width: POPUP_WIDTH,
            height: POPUP_HEIGHT,
        })
    }

    /// Records one popup closure check made `elapsed` after the popup opened.
    ///
    /// The timeout is judged on `elapsed`, not on the number of checks, so
    /// throttled timers cannot stretch it.
    ///
    /// # Errors
    ///
    /// Returns an error unless the popup is being awaited.
    pub fn popup_polled(
        &mut self,
        closed: bool,
        elapsed: Duration,
    ) -> Result<PollOutcome, HandshakeError> {
        let HandshakeState::AwaitingPopupClosure { polls } = self.state else {
            return Err(self.reject("popup polled"));
        };

        if closed {
            self.state = HandshakeState::RetrievingCredentials;
            return Ok(PollOutcome::Closed);
        }

        if self.schedule.is_expired(elapsed) {
            self.state = HandshakeState::Failed(HandshakeError::PopupTimedOut { waited: elapsed });
            return Ok(PollOutcome::TimedOut);
        }

        let polls = polls.saturating_add(1);

        self.state = HandshakeState::AwaitingPopupClosure { polls };
        Ok(PollOutcome::KeepPolling)
    }

    /// Records the result of the credentials lookup.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::IncompleteAuthorization`] when no
    /// credentials were stored, or an invalid-transition error unless
    /// credentials are being retrieved.
    pub fn credentials_received(
        &mut self,
        credentials: Option<Credentials>,
    ) -> Result<IntegrationParams, HandshakeError> {
        if self.state != HandshakeState::RetrievingCredentials {
            return Err(self.reject("credentials received"));
        }

        match credentials {
            Some(credentials) => {
                self.state = HandshakeState::Connected;
                Ok(IntegrationParams::new(credentials, self.integration_type))
            }
            None => {
                let err = HandshakeError::IncompleteAuthorization;
                self.state = HandshakeState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Fails an in-flight handshake.
    ///
    /// Failing a handshake that is not in flight leaves it unchanged.
    pub fn fail(&mut self, error: HandshakeError) {
        if self.state.is_connecting() {
            self.state = HandshakeState::Failed(error);
        }
    }

    /// Returns to idle, dropping any error or connection.
    pub fn reset(&mut self) {
        self.state = HandshakeState::Idle;
    }
}
