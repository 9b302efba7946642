//! Domain services for Proofroom.
//!
//! Services contain business logic that operates on domain models.

pub mod invite;
pub mod memory;
pub mod notification;
pub mod retry;
pub mod store;

pub use invite::{Caller, CreateInvite, CreatedInvite, InviteService};
pub use memory::MemoryStore;
pub use notification::{InviteNotification, InviteNotifier, MockInviteNotifier};
pub use retry::{RetryPolicy, StoreGateway};
pub use store::{GalleryDirectory, IdentityDirectory, InviteStore};
