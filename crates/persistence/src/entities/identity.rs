//! Identity entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Identity, Role};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for identity_role that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "identity_role", rename_all = "lowercase")]
pub enum IdentityRoleDb {
    Owner,
    Admin,
    Guest,
}

impl From<IdentityRoleDb> for Role {
    fn from(db_role: IdentityRoleDb) -> Self {
        match db_role {
            IdentityRoleDb::Owner => Role::Owner,
            IdentityRoleDb::Admin => Role::Admin,
            IdentityRoleDb::Guest => Role::Guest,
        }
    }
}

impl From<Role> for IdentityRoleDb {
    fn from(role: Role) -> Self {
        match role {
            Role::Owner => IdentityRoleDb::Owner,
            Role::Admin => IdentityRoleDb::Admin,
            Role::Guest => IdentityRoleDb::Guest,
        }
    }
}

/// Database row mapping for the identities table.
#[derive(Clone, FromRow)]
pub struct IdentityEntity {
    pub id: Uuid,
    pub email: String,
    pub role: IdentityRoleDb,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<IdentityEntity> for Identity {
    fn from(entity: IdentityEntity) -> Self {
        Self {
            id: entity.id,
            email: entity.email,
            role: entity.role.into(),
            display_name: entity.display_name,
            password_hash: entity.password_hash,
            created_at: entity.created_at,
        }
    }
}
