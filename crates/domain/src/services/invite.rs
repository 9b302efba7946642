//! Invite lifecycle: creation, validation, atomic redemption, revocation and resend.
//!
//! Every storage call goes through the [`StoreGateway`]; a gateway
//! `ServiceUnavailable` surfaces as [`InviteError::ServiceUnavailable`] and is
//! never turned into a lookup failure.

use chrono::{DateTime, Utc};
use metrics::counter;
use shared::crypto::{code_fingerprint, generate_invite_code};
use shared::validation::{normalize_code, normalize_email, validate_email_address, validate_invite_code};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::notification::{InviteNotification, InviteNotifier};
use super::retry::StoreGateway;
use super::store::{GalleryDirectory, IdentityDirectory, InviteStore};
use crate::errors::{InviteError, StoreError};
use crate::models::invite::CreateInviteRequest;
use crate::models::{CapabilityBundle, Gallery, Invite, InviteKind, InviteStatus, NewInvite, Role};

/// Upper bound on code generation attempts before giving up.
const MAX_CODE_ATTEMPTS: usize = 10;

/// The authenticated actor performing a management operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject_id: Uuid,
    pub role: Role,
    pub email: String,
}

/// Parameters of a new invite.
#[derive(Debug, Clone)]
pub struct CreateInvite {
    pub gallery_id: Uuid,
    pub recipient_email: Option<String>,
    pub capabilities: Option<CapabilityBundle>,
    pub kind: Option<InviteKind>,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateInvite {
    pub fn from_request(gallery_id: Uuid, req: CreateInviteRequest) -> Self {
        Self {
            gallery_id,
            recipient_email: req.recipient_email,
            capabilities: req.capabilities,
            kind: req.kind,
            max_usage: req.max_usage,
            expires_at: req.expires_at,
        }
    }
}

/// Result of [`InviteService::create`].
#[derive(Debug, Clone)]
pub struct CreatedInvite {
    pub invite: Invite,
    pub access_url: String,
    /// Whether the recipient notification was handed off.
    pub notified: bool,
}

/// Owns the invite state machine.
pub struct InviteService {
    invites: Arc<dyn InviteStore>,
    galleries: Arc<dyn GalleryDirectory>,
    identities: Arc<dyn IdentityDirectory>,
    notifier: Arc<dyn InviteNotifier>,
    gateway: StoreGateway,
    access_base_url: String,
}

impl InviteService {
    pub fn new(
        invites: Arc<dyn InviteStore>,
        galleries: Arc<dyn GalleryDirectory>,
        identities: Arc<dyn IdentityDirectory>,
        notifier: Arc<dyn InviteNotifier>,
        gateway: StoreGateway,
        access_base_url: impl Into<String>,
    ) -> Self {
        Self {
            invites,
            galleries,
            identities,
            notifier,
            gateway,
            access_base_url: access_base_url.into(),
        }
    }

    pub fn gateway(&self) -> &StoreGateway {
        &self.gateway
    }

    /// Link a recipient follows to redeem `code`.
    pub fn access_url(&self, code: &str) -> String {
        format!("{}/access/{}", self.access_base_url.trim_end_matches('/'), code)
    }

    /// Creates an active invite on a gallery owned by the caller.
    pub async fn create(
        &self,
        caller: &Caller,
        req: CreateInvite,
        now: DateTime<Utc>,
    ) -> Result<CreatedInvite, InviteError> {
        self.authorize_owner(caller, req.gallery_id).await?;

        let kind = req.kind.unwrap_or(InviteKind::SingleUse);
        let max_usage = match (kind, req.max_usage) {
            (_, Some(n)) if n < 1 => {
                return Err(InviteError::Validation("maxUsage must be at least 1".into()))
            }
            (InviteKind::SingleUse, None | Some(1)) => Some(1),
            (InviteKind::SingleUse, Some(_)) => {
                return Err(InviteError::Validation(
                    "single-use invites cannot set maxUsage above 1".into(),
                ))
            }
            (InviteKind::MultiUse, max) => max,
        };

        if req.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(InviteError::Validation("expiresAt must be in the future".into()));
        }

        let recipient_email = match req.recipient_email.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(email) => {
                validate_email_address(email)
                    .map_err(|_| InviteError::Validation("Invalid recipient email".into()))?;
                Some(normalize_email(email))
            }
        };

        let gallery_id = req.gallery_id;
        let gallery = self.require_gallery(gallery_id).await?;

        let invite = self
            .insert_with_fresh_code(NewInvite {
                code: String::new(),
                gallery_id,
                recipient_email,
                kind,
                capabilities: req.capabilities.unwrap_or_else(CapabilityBundle::default_invite),
                max_usage,
                expires_at: req.expires_at,
                created_by: caller.subject_id,
            })
            .await?;
        let access_url = self.access_url(&invite.code);

        info!(
            invite_id = %invite.id,
            gallery_id = %gallery_id,
            code = %code_fingerprint(&invite.code),
            kind = %invite.kind,
            "Invite created"
        );

        let notified = match invite.recipient_email.clone() {
            Some(recipient_email) => {
                self.notify(caller, &gallery, &invite, recipient_email, access_url.clone())
                    .await
            }
            None => false,
        };

        Ok(CreatedInvite {
            invite,
            access_url,
            notified,
        })
    }

    async fn insert_with_fresh_code(&self, mut new: NewInvite) -> Result<Invite, InviteError> {
        let invites = &self.invites;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_invite_code();
            let candidate = code.as_str();
            let taken = self
                .gateway
                .run("invite_code_exists", move || invites.code_exists(candidate))
                .await?;
            if taken {
                continue;
            }

            new.code = code;
            let pending = &new;
            match self
                .gateway
                .run_write("insert_invite", move || invites.insert(pending.clone()))
                .await
            {
                Ok(invite) => return Ok(invite),
                // Lost a race for the same code; draw another.
                Err(StoreError::Conflict(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(InviteError::Internal(
            "could not allocate a unique invite code".into(),
        ))
    }

    /// Looks up an invite by code or by recipient email and runs the ordered
    /// redeemability checks.
    ///
    /// Exactly one of `code` and `email` must be supplied.
    pub async fn validate(
        &self,
        code: Option<&str>,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Invite, Gallery), InviteError> {
        let code = code.map(str::trim).filter(|c| !c.is_empty());
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let invites = &self.invites;

        let found = match (code, email) {
            (Some(code), None) => {
                let code = normalize_code(code);
                validate_invite_code(&code)
                    .map_err(|_| InviteError::Validation("Invalid invite code format".into()))?;
                let code = code.as_str();
                self.gateway
                    .run("find_invite_by_code", move || invites.find_by_code(code))
                    .await?
            }
            (None, Some(email)) => {
                let email = normalize_email(email);
                let email = email.as_str();
                self.gateway
                    .run("find_invite_by_email", move || {
                        invites.find_latest_by_email(email)
                    })
                    .await?
            }
            _ => {
                return Err(InviteError::Validation(
                    "Exactly one of code or email must be supplied".into(),
                ))
            }
        };

        let invite = found.ok_or(InviteError::NotFound)?;
        if let Err(err) = invite.check_redeemable(now) {
            debug!(invite_id = %invite.id, reason = err.kind(), "Invite failed validation");
            return Err(err);
        }

        let gallery = self.require_gallery(invite.gallery_id).await?;
        Ok((invite, gallery))
    }

    /// Consumes one unit of the invite's capacity with a single conditional update.
    pub async fn redeem(&self, invite: &Invite, now: DateTime<Utc>) -> Result<Invite, InviteError> {
        let result = self.redeem_inner(invite.id, now).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        counter!("invite_redemptions_total", "outcome" => outcome).increment(1);
        result
    }

    async fn redeem_inner(&self, invite_id: Uuid, now: DateTime<Utc>) -> Result<Invite, InviteError> {
        let invites = &self.invites;

        let redeemed = self
            .gateway
            .run_write("redeem_invite", move || invites.redeem(invite_id, now))
            .await?;

        if let Some(invite) = redeemed {
            info!(
                invite_id = %invite.id,
                usage_count = invite.usage_count,
                max_usage = ?invite.max_usage,
                "Invite redeemed"
            );
            return Ok(invite);
        }

        // The conditional update matched nothing; report why from a fresh read.
        let current = self
            .gateway
            .run("find_invite_by_id", move || invites.find_by_id(invite_id))
            .await?;
        let err = match current {
            None => InviteError::NotFound,
            Some(invite) => invite
                .check_redeemable(now)
                .err()
                .unwrap_or(InviteError::UsageExceeded),
        };
        debug!(invite_id = %invite_id, reason = err.kind(), "Invite redemption rejected");
        Err(err)
    }

    /// Revokes an invite. Revoking twice is an error.
    pub async fn revoke(&self, caller: &Caller, invite_id: Uuid) -> Result<Invite, InviteError> {
        let invite = self.require_invite(invite_id).await?;
        self.authorize_owner(caller, invite.gallery_id).await?;

        if invite.status == InviteStatus::Revoked {
            return Err(InviteError::AlreadyRevoked);
        }

        let invites = &self.invites;
        let revoked = self
            .gateway
            .run("revoke_invite", move || invites.revoke(invite_id))
            .await?;

        match revoked {
            Some(invite) => {
                info!(invite_id = %invite.id, revoked_by = %caller.subject_id, "Invite revoked");
                Ok(invite)
            }
            // A concurrent revoke won.
            None => Err(InviteError::AlreadyRevoked),
        }
    }

    /// Re-sends the invite notification without touching the invite.
    ///
    /// Returns whether the notifier accepted it.
    pub async fn resend(
        &self,
        caller: &Caller,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, InviteError> {
        let invite = self.require_invite(invite_id).await?;
        self.authorize_owner(caller, invite.gallery_id).await?;

        if invite.status == InviteStatus::Revoked {
            return Err(InviteError::AlreadyRevoked);
        }
        if invite.is_expired_at(now) {
            return Err(InviteError::Expired);
        }
        let recipient_email = invite.recipient_email.clone().ok_or_else(|| {
            InviteError::Validation("Invite has no recipient email to send to".into())
        })?;

        let gallery = self.require_gallery(invite.gallery_id).await?;
        let access_url = self.access_url(&invite.code);
        Ok(self
            .notify(caller, &gallery, &invite, recipient_email, access_url)
            .await)
    }

    /// Every invite of a gallery, newest first.
    pub async fn list_for_gallery(
        &self,
        caller: &Caller,
        gallery_id: Uuid,
    ) -> Result<Vec<Invite>, InviteError> {
        self.authorize_owner(caller, gallery_id).await?;
        let invites = &self.invites;
        Ok(self
            .gateway
            .run("list_invites", move || invites.list_by_gallery(gallery_id))
            .await?)
    }

    pub async fn get(&self, caller: &Caller, invite_id: Uuid) -> Result<Invite, InviteError> {
        let invite = self.require_invite(invite_id).await?;
        self.authorize_owner(caller, invite.gallery_id).await?;
        Ok(invite)
    }

    /// Only the gallery owner or an administrator may manage its invites.
    async fn authorize_owner(&self, caller: &Caller, gallery_id: Uuid) -> Result<(), InviteError> {
        if caller.role == Role::Guest {
            return Err(InviteError::Unauthorized("guests cannot manage invites".into()));
        }

        let galleries = &self.galleries;
        let owner = self
            .gateway
            .run("gallery_owner", move || galleries.owner_of(gallery_id))
            .await?
            .ok_or(InviteError::NotFound)?;

        if caller.role.manages_any_gallery() || owner == caller.subject_id {
            Ok(())
        } else {
            warn!(
                caller_id = %caller.subject_id,
                gallery_id = %gallery_id,
                "Invite management denied for non-owner"
            );
            Err(InviteError::Unauthorized("not the gallery owner".into()))
        }
    }

    async fn require_invite(&self, invite_id: Uuid) -> Result<Invite, InviteError> {
        let invites = &self.invites;
        self.gateway
            .run("find_invite_by_id", move || invites.find_by_id(invite_id))
            .await?
            .ok_or(InviteError::NotFound)
    }

    async fn require_gallery(&self, gallery_id: Uuid) -> Result<Gallery, InviteError> {
        let galleries = &self.galleries;
        self.gateway
            .run("get_gallery", move || galleries.get_gallery(gallery_id))
            .await?
            .ok_or(InviteError::NotFound)
    }

    /// Best-effort delivery; failures are logged and reported as `false`.
    async fn notify(
        &self,
        caller: &Caller,
        gallery: &Gallery,
        invite: &Invite,
        recipient_email: String,
        access_url: String,
    ) -> bool {
        let identities = &self.identities;
        let granter_id = caller.subject_id;
        let granter_name = match self
            .gateway
            .run("find_identity", move || identities.find_identity(granter_id))
            .await
        {
            Ok(Some(identity)) if !identity.display_name.is_empty() => identity.display_name,
            _ => caller.email.clone(),
        };

        let sent = self
            .notifier
            .send_invite_notification(InviteNotification {
                recipient_email,
                gallery_title: gallery.title.clone(),
                granter_name,
                access_url,
                capabilities: invite.capabilities,
            })
            .await;

        if !sent {
            warn!(invite_id = %invite.id, "Invite notification was not delivered");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewIdentity, ObservedStatus};
    use crate::services::memory::MemoryStore;
    use crate::services::notification::MockInviteNotifier;
    use crate::services::retry::RetryPolicy;
    use chrono::Duration;
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;
    use std::time::Duration as StdDuration;

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<MockInviteNotifier>,
        service: Arc<InviteService>,
        owner: Caller,
        gallery: Gallery,
    }

    fn fast_gateway() -> StoreGateway {
        StoreGateway::new(RetryPolicy {
            max_attempts: 3,
            base_delay: StdDuration::from_millis(1),
            max_delay: StdDuration::from_millis(2),
            attempt_timeout: StdDuration::from_secs(1),
        })
    }

    async fn fixture_with(notifier: MockInviteNotifier) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let owner_identity = store
            .add_identity(NewIdentity {
                email: "owner@example.com".into(),
                role: Role::Owner,
                display_name: "Studio North".into(),
                password_hash: None,
            })
            .await;
        let gallery = store.add_gallery(owner_identity.id, "Wedding 2026").await;
        let service = Arc::new(InviteService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            notifier.clone(),
            fast_gateway(),
            "https://proofroom.test/",
        ));

        Fixture {
            store,
            notifier,
            service,
            owner: Caller {
                subject_id: owner_identity.id,
                role: Role::Owner,
                email: owner_identity.email,
            },
            gallery,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(MockInviteNotifier::new()).await
    }

    fn request(gallery_id: Uuid) -> CreateInvite {
        CreateInvite {
            gallery_id,
            recipient_email: Some("Guest@Example.com ".into()),
            capabilities: None,
            kind: None,
            max_usage: None,
            expires_at: None,
        }
    }

    fn guest_caller() -> Caller {
        Caller {
            subject_id: Uuid::new_v4(),
            role: Role::Guest,
            email: SafeEmail().fake(),
        }
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        let invite = &created.invite;
        assert_eq!(invite.code.len(), 12);
        assert_eq!(invite.code, invite.code.to_lowercase());
        assert_eq!(invite.status, InviteStatus::Active);
        assert_eq!(invite.usage_count, 0);
        assert_eq!(invite.kind, InviteKind::SingleUse);
        assert_eq!(invite.max_usage, Some(1));
        assert_eq!(invite.capabilities, CapabilityBundle::default_invite());
        assert_eq!(invite.recipient_email.as_deref(), Some("guest@example.com"));
        assert_eq!(
            created.access_url,
            format!("https://proofroom.test/access/{}", invite.code)
        );

        assert!(created.notified);
        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].granter_name, "Studio North");
        assert_eq!(sent[0].gallery_title, "Wedding 2026");
        assert_eq!(sent[0].access_url, created.access_url);
    }

    #[tokio::test]
    async fn test_create_rejects_non_owner() {
        let fx = fixture().await;
        let stranger = Caller {
            subject_id: Uuid::new_v4(),
            role: Role::Owner,
            email: "other@example.com".into(),
        };

        let err = fx
            .service
            .create(&stranger, request(fx.gallery.id), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, InviteError::Unauthorized(_)));

        let err = fx
            .service
            .create(&guest_caller(), request(fx.gallery.id), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, InviteError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_admin_manages_any_gallery() {
        let fx = fixture().await;
        let admin = Caller {
            subject_id: Uuid::new_v4(),
            role: Role::Admin,
            email: "admin@example.com".into(),
        };
        let created = fx
            .service
            .create(&admin, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();
        assert_eq!(created.invite.created_by, admin.subject_id);
        // Unknown granter falls back to the caller's email.
        assert_eq!(fx.notifier.sent()[0].granter_name, "admin@example.com");
    }

    #[tokio::test]
    async fn test_create_on_missing_gallery() {
        let fx = fixture().await;
        let err = fx
            .service
            .create(&fx.owner, request(Uuid::new_v4()), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::NotFound);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = fixture().await;
        let now = Utc::now();

        let single_with_many = CreateInvite {
            kind: Some(InviteKind::SingleUse),
            max_usage: Some(5),
            ..request(fx.gallery.id)
        };
        let zero_usage = CreateInvite {
            kind: Some(InviteKind::MultiUse),
            max_usage: Some(0),
            ..request(fx.gallery.id)
        };
        let past_expiry = CreateInvite {
            expires_at: Some(now - Duration::hours(1)),
            ..request(fx.gallery.id)
        };
        let bad_email = CreateInvite {
            recipient_email: Some("not-an-email".into()),
            ..request(fx.gallery.id)
        };

        for req in [single_with_many, zero_usage, past_expiry, bad_email] {
            let err = fx.service.create(&fx.owner, req, now).await.unwrap_err();
            assert!(matches!(err, InviteError::Validation(_)), "got {:?}", err);
        }
    }

    #[tokio::test]
    async fn test_create_survives_notification_failure() {
        let fx = fixture_with(MockInviteNotifier::failing()).await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();
        assert!(!created.notified);
        assert_eq!(created.invite.status, InviteStatus::Active);
    }

    #[tokio::test]
    async fn test_create_without_recipient_skips_notification() {
        let fx = fixture().await;
        let req = CreateInvite {
            recipient_email: None,
            kind: Some(InviteKind::MultiUse),
            ..request(fx.gallery.id)
        };
        let created = fx.service.create(&fx.owner, req, Utc::now()).await.unwrap();
        assert!(!created.notified);
        assert_eq!(created.invite.max_usage, None);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_validate_by_code_and_email() {
        let fx = fixture().await;
        let now = Utc::now();
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), now)
            .await
            .unwrap();

        let shouted = format!("  {} ", created.invite.code.to_uppercase());
        let (invite, gallery) = fx.service.validate(Some(&shouted), None, now).await.unwrap();
        assert_eq!(invite.id, created.invite.id);
        assert_eq!(gallery.id, fx.gallery.id);

        let (invite, _) = fx
            .service
            .validate(None, Some("GUEST@example.com"), now)
            .await
            .unwrap();
        assert_eq!(invite.id, created.invite.id);
    }

    #[tokio::test]
    async fn test_validate_requires_exactly_one_key() {
        let fx = fixture().await;
        let now = Utc::now();

        let both = fx
            .service
            .validate(Some("abcdefghjkmn"), Some("guest@example.com"), now)
            .await;
        assert!(matches!(both, Err(InviteError::Validation(_))));

        let neither = fx.service.validate(None, Some("   "), now).await;
        assert!(matches!(neither, Err(InviteError::Validation(_))));
    }

    #[tokio::test]
    async fn test_validate_unknown_code() {
        let fx = fixture().await;
        let err = fx
            .service
            .validate(Some("zzzzzzzzzzzz"), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::NotFound);
    }

    #[tokio::test]
    async fn test_validate_past_expiry_reports_expired() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        let mut stored = created.invite.clone();
        stored.expires_at = Some(Utc::now() - Duration::minutes(5));
        fx.store.put_invite(stored).await;

        let err = fx
            .service
            .validate(Some(&created.invite.code), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::Expired);

        let stored = fx.store.find_by_id(created.invite.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InviteStatus::Active);
        assert_eq!(stored.observed_status(Utc::now()), ObservedStatus::Expired);
    }

    #[tokio::test]
    async fn test_validate_reports_first_failing_check() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        // Revoked, expired and exhausted at once.
        let mut stored = created.invite.clone();
        stored.status = InviteStatus::Revoked;
        stored.expires_at = Some(Utc::now() - Duration::minutes(5));
        stored.usage_count = 1;
        fx.store.put_invite(stored).await;

        let err = fx
            .service
            .validate(Some(&created.invite.code), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::NotActive);
    }

    #[tokio::test]
    async fn test_validate_missing_gallery() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();
        fx.store.remove_gallery(fx.gallery.id).await;

        let err = fx
            .service
            .validate(Some(&created.invite.code), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::NotFound);
    }

    #[tokio::test]
    async fn test_multi_use_three_then_exhausted() {
        let fx = fixture().await;
        let req = CreateInvite {
            kind: Some(InviteKind::MultiUse),
            max_usage: Some(3),
            ..request(fx.gallery.id)
        };
        let created = fx.service.create(&fx.owner, req, Utc::now()).await.unwrap();

        for expected in 1..=3 {
            let (invite, _) = fx
                .service
                .validate(Some(&created.invite.code), None, Utc::now())
                .await
                .unwrap();
            let redeemed = fx.service.redeem(&invite, Utc::now()).await.unwrap();
            assert_eq!(redeemed.usage_count, expected);
            assert!(redeemed.used_at.is_some());
        }

        let err = fx
            .service
            .validate(Some(&created.invite.code), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::UsageExceeded);

        let err = fx
            .service
            .redeem(&created.invite, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::UsageExceeded);
    }

    #[tokio::test]
    async fn test_redeem_after_revoke_is_not_active() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();
        let (validated, _) = fx
            .service
            .validate(Some(&created.invite.code), None, Utc::now())
            .await
            .unwrap();

        fx.service.revoke(&fx.owner, created.invite.id).await.unwrap();

        // The validated copy is stale; the conditional update still refuses.
        let err = fx.service.redeem(&validated, Utc::now()).await.unwrap_err();
        assert_eq!(err, InviteError::NotActive);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_single_use_has_one_winner() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let service = fx.service.clone();
            let invite = created.invite.clone();
            handles.push(tokio::spawn(async move {
                service.redeem(&invite, Utc::now()).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(
                    matches!(err, InviteError::UsageExceeded | InviteError::NotActive),
                    "unexpected error {:?}",
                    err
                ),
            }
        }
        assert_eq!(successes, 1);

        let stored = fx.store.find_by_id(created.invite.id).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_multi_use_never_exceeds_max() {
        let fx = fixture().await;
        let req = CreateInvite {
            kind: Some(InviteKind::MultiUse),
            max_usage: Some(5),
            ..request(fx.gallery.id)
        };
        let created = fx.service.create(&fx.owner, req, Utc::now()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let service = fx.service.clone();
            let invite = created.invite.clone();
            handles.push(tokio::spawn(async move {
                service.redeem(&invite, Utc::now()).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 5);

        let stored = fx.store.find_by_id(created.invite.id).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 5);
    }

    #[tokio::test]
    async fn test_revoke_twice_is_reported() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        let revoked = fx.service.revoke(&fx.owner, created.invite.id).await.unwrap();
        assert_eq!(revoked.status, InviteStatus::Revoked);
        let before = fx.store.find_by_id(created.invite.id).await.unwrap().unwrap();

        let err = fx
            .service
            .revoke(&fx.owner, created.invite.id)
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::AlreadyRevoked);

        let after = fx.store.find_by_id(created.invite.id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_revoke_requires_ownership() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        let err = fx
            .service
            .revoke(&guest_caller(), created.invite.id)
            .await
            .unwrap_err();
        assert!(matches!(err, InviteError::Unauthorized(_)));

        let err = fx.service.revoke(&fx.owner, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, InviteError::NotFound);
    }

    #[tokio::test]
    async fn test_resend() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        assert!(fx
            .service
            .resend(&fx.owner, created.invite.id, Utc::now())
            .await
            .unwrap());
        assert_eq!(fx.notifier.sent().len(), 2);

        let stored = fx.store.find_by_id(created.invite.id).await.unwrap().unwrap();
        assert_eq!(stored, created.invite);
    }

    #[tokio::test]
    async fn test_resend_rejects_revoked_and_expired() {
        let fx = fixture().await;
        let now = Utc::now();
        let revoked = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), now)
            .await
            .unwrap();
        fx.service.revoke(&fx.owner, revoked.invite.id).await.unwrap();
        let err = fx
            .service
            .resend(&fx.owner, revoked.invite.id, now)
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::AlreadyRevoked);

        let expiring = CreateInvite {
            expires_at: Some(now + Duration::minutes(10)),
            ..request(fx.gallery.id)
        };
        let expiring = fx.service.create(&fx.owner, expiring, now).await.unwrap();
        let err = fx
            .service
            .resend(&fx.owner, expiring.invite.id, now + Duration::hours(1))
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::Expired);
    }

    #[tokio::test]
    async fn test_resend_without_recipient() {
        let fx = fixture().await;
        let req = CreateInvite {
            recipient_email: None,
            ..request(fx.gallery.id)
        };
        let created = fx.service.create(&fx.owner, req, Utc::now()).await.unwrap();
        let err = fx
            .service
            .resend(&fx.owner, created.invite.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, InviteError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let fx = fixture().await;
        let first = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(2)).await;
        let second = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        let list = fx
            .service
            .list_for_gallery(&fx.owner, fx.gallery.id)
            .await
            .unwrap();
        let ids: Vec<Uuid> = list.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![second.invite.id, first.invite.id]);

        let fetched = fx.service.get(&fx.owner, first.invite.id).await.unwrap();
        assert_eq!(fetched, first.invite);

        let err = fx
            .service
            .list_for_gallery(&guest_caller(), fx.gallery.id)
            .await
            .unwrap_err();
        assert!(matches!(err, InviteError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_outage_is_not_a_lookup_failure() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        fx.store.inject_transient_failures(3);
        let err = fx
            .service
            .validate(Some(&created.invite.code), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, InviteError::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_transient_blip_is_retried() {
        let fx = fixture().await;
        let created = fx
            .service
            .create(&fx.owner, request(fx.gallery.id), Utc::now())
            .await
            .unwrap();

        fx.store.inject_transient_failures(2);
        let (invite, _) = fx
            .service
            .validate(Some(&created.invite.code), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(invite.id, created.invite.id);
    }
}
