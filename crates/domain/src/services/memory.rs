//! In-process store used for development and tests.
//!
//! There is no conditional update to lean on here, so redemption checks and
//! increments under the same write guard that `revoke` takes. This protects a
//! single process only; multi-instance deployments must use the Postgres backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{GalleryDirectory, IdentityDirectory, InviteStore};
use crate::errors::StoreError;
use crate::models::identity::{anonymous_guest_email, guest_display_name};
use crate::models::{Gallery, Identity, Invite, InviteStatus, NewIdentity, NewInvite, Role};

/// Memory-backed implementation of every storage collaborator.
#[derive(Default)]
pub struct MemoryStore {
    invites: RwLock<HashMap<Uuid, Invite>>,
    galleries: RwLock<HashMap<Uuid, Gallery>>,
    identities: RwLock<HashMap<Uuid, Identity>>,
    injected_failures: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls fail with a transient error.
    pub fn inject_transient_failures(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Adds a gallery owned by `owner_id`.
    pub async fn add_gallery(&self, owner_id: Uuid, title: &str) -> Gallery {
        let gallery = Gallery {
            id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.galleries
            .write()
            .await
            .insert(gallery.id, gallery.clone());
        gallery
    }

    pub async fn remove_gallery(&self, id: Uuid) {
        self.galleries.write().await.remove(&id);
    }

    /// Adds an identity directly, bypassing the injected failures.
    pub async fn add_identity(&self, new: NewIdentity) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: new.email,
            role: new.role,
            display_name: new.display_name,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };
        self.identities
            .write()
            .await
            .insert(identity.id, identity.clone());
        identity
    }

    /// Overwrites a stored invite.
    pub async fn put_invite(&self, invite: Invite) {
        self.invites.write().await.insert(invite.id, invite);
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::Transient("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl InviteStore for MemoryStore {
    async fn insert(&self, new: NewInvite) -> Result<Invite, StoreError> {
        self.take_failure()?;
        let mut invites = self.invites.write().await;
        if invites.values().any(|i| i.code == new.code) {
            return Err(StoreError::Conflict("invite code already exists".to_string()));
        }

        let invite = Invite {
            id: Uuid::new_v4(),
            code: new.code,
            gallery_id: new.gallery_id,
            recipient_email: new.recipient_email,
            kind: new.kind,
            status: InviteStatus::Active,
            capabilities: new.capabilities,
            usage_count: 0,
            max_usage: new.max_usage,
            expires_at: new.expires_at,
            created_by: new.created_by,
            created_at: Utc::now(),
            used_at: None,
        };
        invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invite>, StoreError> {
        self.take_failure()?;
        Ok(self.invites.read().await.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>, StoreError> {
        self.take_failure()?;
        Ok(self
            .invites
            .read()
            .await
            .values()
            .find(|i| i.code == code)
            .cloned())
    }

    async fn find_latest_by_email(&self, email: &str) -> Result<Option<Invite>, StoreError> {
        self.take_failure()?;
        let invites = self.invites.read().await;
        let latest = invites
            .values()
            .filter(|i| {
                i.recipient_email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .max_by_key(|i| (i.status != InviteStatus::Revoked, i.created_at));
        Ok(latest.cloned())
    }

    async fn list_by_gallery(&self, gallery_id: Uuid) -> Result<Vec<Invite>, StoreError> {
        self.take_failure()?;
        let mut list: Vec<Invite> = self
            .invites
            .read()
            .await
            .values()
            .filter(|i| i.gallery_id == gallery_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        self.take_failure()?;
        Ok(self.invites.read().await.values().any(|i| i.code == code))
    }

    async fn redeem(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Invite>, StoreError> {
        self.take_failure()?;
        // Check and increment happen under one write guard, so neither a
        // concurrent redeem nor a revoke can land in between.
        let mut invites = self.invites.write().await;
        let Some(invite) = invites.get_mut(&id) else {
            return Ok(None);
        };
        if invite.check_redeemable(now).is_err() {
            return Ok(None);
        }
        invite.usage_count += 1;
        invite.used_at = Some(now);
        Ok(Some(invite.clone()))
    }

    async fn revoke(&self, id: Uuid) -> Result<Option<Invite>, StoreError> {
        self.take_failure()?;
        let mut invites = self.invites.write().await;
        match invites.get_mut(&id) {
            Some(invite) if invite.status != InviteStatus::Revoked => {
                invite.status = InviteStatus::Revoked;
                Ok(Some(invite.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl GalleryDirectory for MemoryStore {
    async fn get_gallery(&self, id: Uuid) -> Result<Option<Gallery>, StoreError> {
        self.take_failure()?;
        Ok(self.galleries.read().await.get(&id).cloned())
    }

    async fn owner_of(&self, gallery_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        self.take_failure()?;
        Ok(self
            .galleries
            .read()
            .await
            .get(&gallery_id)
            .map(|g| g.owner_id))
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        self.take_failure()?;
        Ok(self.identities.read().await.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        self.take_failure()?;
        Ok(self
            .identities
            .read()
            .await
            .values()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_identity(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        self.take_failure()?;
        let mut identities = self.identities.write().await;
        if identities
            .values()
            .any(|i| i.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email: new.email,
            role: new.role,
            display_name: new.display_name,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };
        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn ensure_guest(
        &self,
        email: Option<&str>,
        invite: &Invite,
    ) -> Result<Identity, StoreError> {
        self.take_failure()?;
        let email = match email {
            Some(email) => email.to_lowercase(),
            None => anonymous_guest_email(invite.id),
        };

        let mut identities = self.identities.write().await;
        if let Some(existing) = identities.values().find(|i| i.email == email) {
            return Ok(existing.clone());
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            display_name: guest_display_name(&email),
            email,
            role: Role::Guest,
            password_hash: None,
            created_at: Utc::now(),
        };
        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }
}
