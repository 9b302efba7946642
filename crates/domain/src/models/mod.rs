//! Domain models for Proofroom.

pub mod gallery;
pub mod identity;
pub mod invite;

pub use gallery::{Gallery, GallerySummary};
pub use identity::{Identity, IdentityView, NewIdentity};
pub use invite::{
    derive_capabilities, is_effectively_accessible, Invite, InviteKind, InviteStatus, NewInvite,
    ObservedStatus,
};
pub use shared::capability::{CapabilityBundle, Role};
