//! Storage and lookup collaborators consumed by the access core.
//!
//! Every call goes through [`StoreGateway`](super::retry::StoreGateway);
//! implementations only classify their failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{Gallery, Identity, Invite, NewIdentity, NewInvite};

/// Persistence of invites.
#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn insert(&self, invite: NewInvite) -> Result<Invite, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invite>, StoreError>;

    /// Lookup by normalized code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>, StoreError>;

    /// Most recently created non-revoked invite for a normalized email,
    /// falling back to the most recent revoked one.
    async fn find_latest_by_email(&self, email: &str) -> Result<Option<Invite>, StoreError>;

    /// All invites of a gallery, newest first.
    async fn list_by_gallery(&self, gallery_id: Uuid) -> Result<Vec<Invite>, StoreError>;

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError>;

    /// Atomically consumes one unit of capacity.
    ///
    /// Increments `usage_count` and sets `used_at = now` only if the invite is
    /// active, unexpired at `now` and below `max_usage`, as one conditional
    /// update. Returns `None` when the condition did not hold.
    async fn redeem(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Invite>, StoreError>;

    /// Sets `status = revoked` unless already revoked. Returns `None` when
    /// nothing changed.
    async fn revoke(&self, id: Uuid) -> Result<Option<Invite>, StoreError>;
}

/// Read access to galleries.
#[async_trait]
pub trait GalleryDirectory: Send + Sync {
    async fn get_gallery(&self, id: Uuid) -> Result<Option<Gallery>, StoreError>;

    async fn owner_of(&self, gallery_id: Uuid) -> Result<Option<Uuid>, StoreError>;
}

/// Account lookups needed for credential issuance.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Lookup by normalized email.
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn insert_identity(&self, identity: NewIdentity) -> Result<Identity, StoreError>;

    /// Returns the guest profile for `email`, creating it on first redemption.
    /// Without an email, one anonymous profile exists per invite.
    async fn ensure_guest(
        &self,
        email: Option<&str>,
        invite: &Invite,
    ) -> Result<Identity, StoreError>;
}
