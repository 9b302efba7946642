//! Identity models for owners, administrators and guests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::capability::{CapabilityBundle, Role};
use uuid::Uuid;
use validator::Validate;

/// An account known to the system. Guests have no password.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("display_name", &self.display_name)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Fields of an identity about to be persisted.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub password_hash: Option<String>,
}

/// Placeholder address of the anonymous guest profile bound to one invite.
pub fn anonymous_guest_email(invite_id: Uuid) -> String {
    format!("invite-{}@guests.invalid", invite_id.simple())
}

/// Display name derived from the local part of a guest email.
pub fn guest_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// Public view of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Response for the current-identity endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentIdentityResponse {
    pub identity: IdentityView,
    pub capabilities: CapabilityBundle,
}

/// Request body for password sign-in.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Response body for a successful sign-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub identity: IdentityView,
    pub capabilities: CapabilityBundle,
    pub token: String,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_debug_redacts_hash() {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
            role: Role::Owner,
            display_name: "Studio".into(),
            password_hash: Some("$argon2id$secret".into()),
            created_at: Utc::now(),
        };
        let debug = format!("{:?}", identity);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_login_request_validation() {
        let req = LoginRequest {
            email: "owner@example.com".into(),
            password: String::new(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_guest_profile_helpers() {
        let invite_id = Uuid::new_v4();
        assert_eq!(
            anonymous_guest_email(invite_id),
            anonymous_guest_email(invite_id)
        );
        assert!(anonymous_guest_email(invite_id).ends_with("@guests.invalid"));
        assert_eq!(guest_display_name("ana.kovac@example.com"), "ana.kovac");
    }
}
