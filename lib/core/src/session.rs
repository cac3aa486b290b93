//! Session identity attached to every integrations request.

use crate::id::{OrgId, UserId};
use crate::integration_type::IntegrationType;
use serde::{Deserialize, Serialize};

/// User shown in the form before anything is typed.
pub const DEFAULT_USER: &str = "TestUser";

/// Organization shown in the form before anything is typed.
pub const DEFAULT_ORG: &str = "TestOrg";

/// The identity an integration is authorized for.
///
/// The backend keys pending OAuth state and credentials by
/// `(integration_type, org_id, user_id)`, so the same context must be used
/// for the authorize and credentials calls of one handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: UserId,
    pub org_id: OrgId,
    pub integration_type: IntegrationType,
}

impl SessionContext {
    /// Creates a session context.
    #[must_use]
    pub fn new(user_id: UserId, org_id: OrgId, integration_type: IntegrationType) -> Self {
        Self {
            user_id,
            org_id,
            integration_type,
        }
    }

    /// Returns the identity as form fields, in the order they are sent.
    #[must_use]
    pub fn form_fields(&self) -> [(&'static str, String); 3] {
        [
            (
                IntegrationType::field_name(),
                self.integration_type.as_str().to_string(),
            ),
            (UserId::field_name(), self.user_id.to_string()),
            (OrgId::field_name(), self.org_id.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_carry_identity() {
        let ctx = SessionContext::new(
            UserId::new(DEFAULT_USER).expect("user"),
            OrgId::new(DEFAULT_ORG).expect("org"),
            IntegrationType::Notion,
        );

        let fields = ctx.form_fields();
        assert_eq!(fields[0], ("integration_type", "notion".to_string()));
        assert_eq!(fields[1], ("user_id", "TestUser".to_string()));
        assert_eq!(fields[2], ("org_id", "TestOrg".to_string()));
    }
}
