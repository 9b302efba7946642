//! Identity repository.

use async_trait::async_trait;
use domain::models::identity::{anonymous_guest_email, guest_display_name};
use domain::models::{Identity, Invite, NewIdentity};
use domain::services::IdentityDirectory;
use domain::StoreError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{IdentityEntity, IdentityRoleDb};
use crate::error::classify;
use crate::metrics::QueryTimer;

/// Repository for identity lookups and guest profile creation.
#[derive(Clone)]
pub struct IdentityRepository {
    pool: PgPool,
}

impl IdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityDirectory for IdentityRepository {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let timer = QueryTimer::new("find_identity_by_id");
        let result = sqlx::query_as::<_, IdentityEntity>(
            r#"
            SELECT id, email, role, display_name, password_hash, created_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let timer = QueryTimer::new("find_identity_by_email");
        let result = sqlx::query_as::<_, IdentityEntity>(
            r#"
            SELECT id, email, role, display_name, password_hash, created_at
            FROM identities
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.map(Into::into))
    }

    async fn insert_identity(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        let timer = QueryTimer::new("insert_identity");
        let result = sqlx::query_as::<_, IdentityEntity>(
            r#"
            INSERT INTO identities (email, role, display_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, role, display_name, password_hash, created_at
            "#,
        )
        .bind(&identity.email)
        .bind(IdentityRoleDb::from(identity.role))
        .bind(&identity.display_name)
        .bind(&identity.password_hash)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.into())
    }

    async fn ensure_guest(
        &self,
        email: Option<&str>,
        invite: &Invite,
    ) -> Result<Identity, StoreError> {
        let email = match email {
            Some(email) => email.to_lowercase(),
            None => anonymous_guest_email(invite.id),
        };
        let display_name = guest_display_name(&email);

        // The no-op update makes RETURNING yield the existing row on conflict.
        let timer = QueryTimer::new("ensure_guest_identity");
        let result = sqlx::query_as::<_, IdentityEntity>(
            r#"
            INSERT INTO identities (email, role, display_name)
            VALUES ($1, 'guest', $2)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email, role, display_name, password_hash, created_at
            "#,
        )
        .bind(&email)
        .bind(&display_name)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(classify)?.into())
    }
}
