//! Invite repository for database operations.
//!
//! Redemption and revocation are single conditional updates; the row lock
//! taken by `UPDATE` serializes concurrent redeemers of the same invite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{Invite, NewInvite};
use domain::services::InviteStore;
use domain::StoreError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{InviteEntity, InviteKindDb};
use crate::error::classify;
use crate::metrics::QueryTimer;

/// Repository for invite-related database operations.
#[derive(Clone)]
pub struct InviteRepository {
    pool: PgPool,
}

impl InviteRepository {
    /// Creates a new InviteRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InviteStore for InviteRepository {
    async fn insert(&self, invite: NewInvite) -> Result<Invite, StoreError> {
        let caps = invite.capabilities;
        let timer = QueryTimer::new("insert_invite");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            INSERT INTO invites (
                code, gallery_id, recipient_email, kind, status,
                can_view, can_favorite, can_comment, can_download, can_request_purchase,
                max_usage, expires_at, created_by
            )
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, code, gallery_id, recipient_email, kind, status,
                      can_view, can_favorite, can_comment, can_download, can_request_purchase,
                      usage_count, max_usage, expires_at, created_by, created_at, used_at
            "#,
        )
        .bind(&invite.code)
        .bind(invite.gallery_id)
        .bind(&invite.recipient_email)
        .bind(InviteKindDb::from(invite.kind))
        .bind(caps.can_view)
        .bind(caps.can_favorite)
        .bind(caps.can_comment)
        .bind(caps.can_download)
        .bind(caps.can_request_purchase)
        .bind(invite.max_usage)
        .bind(invite.expires_at)
        .bind(invite.created_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invite>, StoreError> {
        let timer = QueryTimer::new("find_invite_by_id");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            SELECT id, code, gallery_id, recipient_email, kind, status,
                   can_view, can_favorite, can_comment, can_download, can_request_purchase,
                   usage_count, max_usage, expires_at, created_by, created_at, used_at
            FROM invites
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>, StoreError> {
        let timer = QueryTimer::new("find_invite_by_code");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            SELECT id, code, gallery_id, recipient_email, kind, status,
                   can_view, can_favorite, can_comment, can_download, can_request_purchase,
                   usage_count, max_usage, expires_at, created_by, created_at, used_at
            FROM invites
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }

    async fn find_latest_by_email(&self, email: &str) -> Result<Option<Invite>, StoreError> {
        let timer = QueryTimer::new("find_invite_by_email");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            SELECT id, code, gallery_id, recipient_email, kind, status,
                   can_view, can_favorite, can_comment, can_download, can_request_purchase,
                   usage_count, max_usage, expires_at, created_by, created_at, used_at
            FROM invites
            WHERE lower(recipient_email) = lower($1)
            ORDER BY (status <> 'revoked') DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }

    async fn list_by_gallery(&self, gallery_id: Uuid) -> Result<Vec<Invite>, StoreError> {
        let timer = QueryTimer::new("list_invites_by_gallery");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            SELECT id, code, gallery_id, recipient_email, kind, status,
                   can_view, can_favorite, can_comment, can_download, can_request_purchase,
                   usage_count, max_usage, expires_at, created_by, created_at, used_at
            FROM invites
            WHERE gallery_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(gallery_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(classify)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("check_invite_code_exists");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM invites WHERE code = $1)
            "#,
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map_err(classify)
    }

    async fn redeem(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Invite>, StoreError> {
        let timer = QueryTimer::new("redeem_invite");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            UPDATE invites
            SET usage_count = usage_count + 1, used_at = $2
            WHERE id = $1
              AND status = 'active'
              AND (max_usage IS NULL OR usage_count < max_usage)
              AND (expires_at IS NULL OR expires_at > $2)
            RETURNING id, code, gallery_id, recipient_email, kind, status,
                      can_view, can_favorite, can_comment, can_download, can_request_purchase,
                      usage_count, max_usage, expires_at, created_by, created_at, used_at
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }

    async fn revoke(&self, id: Uuid) -> Result<Option<Invite>, StoreError> {
        let timer = QueryTimer::new("revoke_invite");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            UPDATE invites
            SET status = 'revoked'
            WHERE id = $1 AND status <> 'revoked'
            RETURNING id, code, gallery_id, recipient_email, kind, status,
                      can_view, can_favorite, can_comment, can_download, can_request_purchase,
                      usage_count, max_usage, expires_at, created_by, created_at, used_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }
}
