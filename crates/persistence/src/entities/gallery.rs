//! Gallery entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the galleries table.
#[derive(Debug, Clone, FromRow)]
pub struct GalleryEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<GalleryEntity> for domain::models::Gallery {
    fn from(entity: GalleryEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.owner_id,
            title: entity.title,
            created_at: entity.created_at,
        }
    }
}
