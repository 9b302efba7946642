//! Database entity definitions.

pub mod gallery;
pub mod identity;
pub mod invite;

pub use gallery::GalleryEntity;
pub use identity::{IdentityEntity, IdentityRoleDb};
pub use invite::{InviteEntity, InviteKindDb, InviteStatusDb};
