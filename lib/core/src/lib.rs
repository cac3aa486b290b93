//! Core domain types and utilities for tether.
//!
//! This crate provides the identity types, the integration type enumeration
//! and the session context shared by the browser UI and the integrations
//! backend.

pub mod error;
pub mod id;
pub mod integration_type;
pub mod session;

pub use error::Result;
pub use id::{OrgId, ParseIdError, UserId};
pub use integration_type::{IntegrationType, ParseIntegrationTypeError};
pub use session::{DEFAULT_ORG, DEFAULT_USER, SessionContext};
