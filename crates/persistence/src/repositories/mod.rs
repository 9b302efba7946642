//! Repository implementations of the domain storage traits.

pub mod gallery;
pub mod identity;
pub mod invite;

pub use gallery::GalleryRepository;
pub use identity::IdentityRepository;
pub use invite::InviteRepository;
