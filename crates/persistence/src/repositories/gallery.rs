//! Gallery repository. Galleries are written by the media subsystem; this
//! core only reads them.

use async_trait::async_trait;
use domain::models::Gallery;
use domain::services::GalleryDirectory;
use domain::StoreError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::GalleryEntity;
use crate::error::classify;
use crate::metrics::QueryTimer;

/// Repository for gallery lookups.
#[derive(Clone)]
pub struct GalleryRepository {
    pool: PgPool,
}

impl GalleryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GalleryDirectory for GalleryRepository {
    async fn get_gallery(&self, id: Uuid) -> Result<Option<Gallery>, StoreError> {
        let timer = QueryTimer::new("get_gallery");
        let result = sqlx::query_as::<_, GalleryEntity>(
            r#"
            SELECT id, owner_id, title, created_at
            FROM galleries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }

    async fn owner_of(&self, gallery_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let timer = QueryTimer::new("gallery_owner");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT owner_id FROM galleries WHERE id = $1
            "#,
        )
        .bind(gallery_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result.map_err(classify)
    }
}
