//! Credential payloads for the two ways a session starts.

use domain::models::Identity;
use shared::capability::{CapabilityBundle, Role};
use shared::jwt::CredentialPayload;

/// Payload for an owner or administrator signing in with a password.
/// Management sessions carry every capability.
pub fn management_payload(identity: &Identity) -> CredentialPayload {
    CredentialPayload {
        subject_id: identity.id,
        email: identity.email.clone(),
        role: identity.role,
        owner_profile_id: Some(identity.id),
        guest_profile_id: None,
        permissions: CapabilityBundle::all(),
    }
}

/// Payload for a guest who redeemed an invite.
///
/// The role is always `Guest` and the capabilities are exactly the invite's,
/// whatever the stored identity says.
pub fn guest_payload(guest: &Identity, granted: CapabilityBundle) -> CredentialPayload {
    CredentialPayload {
        subject_id: guest.id,
        email: guest.email.clone(),
        role: Role::Guest,
        owner_profile_id: None,
        guest_profile_id: Some(guest.id),
        permissions: granted,
    }
}
