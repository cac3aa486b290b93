//! Integration client library for tether.
//!
//! This crate provides:
//!
//! - **API client**: calls to the backend integrations service
//! - **Registry**: display name and popup window name per integration
//! - **Handshake**: the OAuth popup state machine and its driver

pub mod client;
pub mod credential;
pub mod error;
pub mod flow;
pub mod handshake;
pub mod registry;

pub use client::{DEFAULT_BASE_URL, HttpIntegrationsClient, IntegrationsApi};
pub use credential::{Credentials, IntegrationParams};
pub use error::{ApiError, HandshakeError};
pub use flow::{Clock, HandshakeDriver, PopupOpener, PopupWindow, Sleeper};
pub use handshake::{Handshake, HandshakeState, PollOutcome, PollSchedule, PopupRequest};
pub use registry::{IntegrationConfig, all_integrations, filter_integrations, integration_config};
