//! Administrator bootstrap.
//!
//! Creates the first administrator on startup when configured. Idempotent:
//! an existing identity with the bootstrap email is left untouched.

use domain::models::{Identity, NewIdentity, Role};
use domain::services::{IdentityDirectory, StoreGateway};
use domain::StoreError;
use shared::password::{hash_password, PasswordError};
use shared::validation::{normalize_email, validate_email_address};
use tracing::{info, warn};

use crate::config::AuthConfig;

/// Error types for admin bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] PasswordError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Creates the bootstrap administrator if configured and absent.
///
/// Returns the created identity, or `None` when nothing was done.
pub async fn bootstrap_admin(
    identities: &dyn IdentityDirectory,
    gateway: &StoreGateway,
    config: &AuthConfig,
) -> Result<Option<Identity>, BootstrapError> {
    if config.bootstrap_email.trim().is_empty() {
        return Ok(None);
    }

    if config.bootstrap_password.is_empty() {
        warn!("PR__AUTH__BOOTSTRAP_EMAIL is set but PR__AUTH__BOOTSTRAP_PASSWORD is empty, skipping bootstrap");
        return Ok(None);
    }

    let email = normalize_email(&config.bootstrap_email);
    validate_email_address(&email)
        .map_err(|_| BootstrapError::Config("bootstrap email is not a valid address".into()))?;

    let lookup = email.as_str();
    let existing = gateway
        .run("find_identity_by_email", move || {
            identities.find_identity_by_email(lookup)
        })
        .await?;

    if let Some(existing) = existing {
        info!(identity_id = %existing.id, role = %existing.role, "Bootstrap identity already exists, skipping");
        return Ok(None);
    }

    let new = NewIdentity {
        email: email.clone(),
        role: Role::Admin,
        display_name: "Administrator".to_string(),
        password_hash: Some(hash_password(&config.bootstrap_password)?),
    };

    // Not retried through the gateway: a retried insert could double-create.
    let admin = identities.insert_identity(new).await?;

    info!(identity_id = %admin.id, email = %admin.email, "Bootstrap administrator created");
    warn!("SECURITY: remove PR__AUTH__BOOTSTRAP_PASSWORD from configuration after initial setup");

    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::{MemoryStore, RetryPolicy};
    use shared::password::verify_password;

    fn auth_config(email: &str, password: &str) -> AuthConfig {
        AuthConfig {
            token_secret: "test-secret-test-secret-test-secret-0123".into(),
            token_ttl_secs: 3600,
            leeway_secs: 0,
            bootstrap_email: email.into(),
            bootstrap_password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_creates_admin_once() {
        let store = MemoryStore::new();
        let gateway = StoreGateway::new(RetryPolicy::default());
        let config = auth_config(" Admin@Proofroom.app ", "correct horse");

        let created = bootstrap_admin(&store, &gateway, &config)
            .await
            .unwrap()
            .expect("admin created");
        assert_eq!(created.email, "admin@proofroom.app");
        assert_eq!(created.role, Role::Admin);
        assert!(verify_password("correct horse", created.password_hash.as_deref().unwrap()).unwrap());

        let second = bootstrap_admin(&store, &gateway, &config).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_skips_without_password() {
        let store = MemoryStore::new();
        let gateway = StoreGateway::default();

        let result = bootstrap_admin(&store, &gateway, &auth_config("admin@proofroom.app", ""))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_rejects_invalid_email() {
        let store = MemoryStore::new();
        let gateway = StoreGateway::default();

        let result =
            bootstrap_admin(&store, &gateway, &auth_config("not-an-email", "secret")).await;
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }
}
