//! Invite entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{CapabilityBundle, Invite, InviteKind, InviteStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for invite_status. `expired` is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invite_status", rename_all = "lowercase")]
pub enum InviteStatusDb {
    Pending,
    Active,
    Revoked,
}

impl From<InviteStatusDb> for InviteStatus {
    fn from(db_status: InviteStatusDb) -> Self {
        match db_status {
            InviteStatusDb::Pending => InviteStatus::Pending,
            InviteStatusDb::Active => InviteStatus::Active,
            InviteStatusDb::Revoked => InviteStatus::Revoked,
        }
    }
}

/// Database enum for invite_kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invite_kind", rename_all = "snake_case")]
pub enum InviteKindDb {
    SingleUse,
    MultiUse,
}

impl From<InviteKindDb> for InviteKind {
    fn from(db_kind: InviteKindDb) -> Self {
        match db_kind {
            InviteKindDb::SingleUse => InviteKind::SingleUse,
            InviteKindDb::MultiUse => InviteKind::MultiUse,
        }
    }
}

impl From<InviteKind> for InviteKindDb {
    fn from(kind: InviteKind) -> Self {
        match kind {
            InviteKind::SingleUse => InviteKindDb::SingleUse,
            InviteKind::MultiUse => InviteKindDb::MultiUse,
        }
    }
}

/// Database row mapping for the invites table.
#[derive(Debug, Clone, FromRow)]
pub struct InviteEntity {
    pub id: Uuid,
    pub code: String,
    pub gallery_id: Uuid,
    pub recipient_email: Option<String>,
    pub kind: InviteKindDb,
    pub status: InviteStatusDb,
    pub can_view: bool,
    pub can_favorite: bool,
    pub can_comment: bool,
    pub can_download: bool,
    pub can_request_purchase: bool,
    pub usage_count: i32,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<InviteEntity> for Invite {
    fn from(entity: InviteEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            gallery_id: entity.gallery_id,
            recipient_email: entity.recipient_email,
            kind: entity.kind.into(),
            status: entity.status.into(),
            capabilities: CapabilityBundle {
                can_view: entity.can_view,
                can_favorite: entity.can_favorite,
                can_comment: entity.can_comment,
                can_download: entity.can_download,
                can_request_purchase: entity.can_request_purchase,
            },
            usage_count: entity.usage_count,
            max_usage: entity.max_usage,
            expires_at: entity.expires_at,
            created_by: entity.created_by,
            created_at: entity.created_at,
            used_at: entity.used_at,
        }
    }
}
