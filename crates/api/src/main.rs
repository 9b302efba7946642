use anyhow::{Context, Result};
use domain::services::{InviteNotifier, MemoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use proofroom_api::app::{create_app, AppState, Backend};
use proofroom_api::config::{Config, StorageBackend};
use proofroom_api::middleware::{init_metrics, logging::init_logging};
use proofroom_api::services::{bootstrap::bootstrap_admin, EmailService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging);
    init_metrics().context("failed to install metrics recorder")?;

    info!("Starting Proofroom access service v{}", env!("CARGO_PKG_VERSION"));

    let backend = match config.storage.backend {
        StorageBackend::Postgres => {
            let db_config = persistence::db::DatabaseConfig::from(&config.database);
            let pool = persistence::db::create_pool(&db_config).await?;

            info!("Running database migrations...");
            persistence::db::run_migrations(&pool).await?;
            info!("Migrations completed");

            let metrics_pool = pool.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(15));
                loop {
                    interval.tick().await;
                    persistence::metrics::record_pool_metrics(&metrics_pool);
                }
            });

            Backend::postgres(pool)
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; state is lost on restart and redemption is only serialized within this process");
            Backend::memory(Arc::new(MemoryStore::new()))
        }
    };

    let notifier: Arc<dyn InviteNotifier> = Arc::new(EmailService::new(config.email.clone()));
    let addr = config.socket_addr()?;
    let state = AppState::new(config, backend, notifier)?;

    bootstrap_admin(
        state.backend.identities.as_ref(),
        state.gateway(),
        &state.config.auth,
    )
    .await?;

    if let Some(limiter) = state.rate_limiter.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                limiter.prune();
            }
        });
    }

    let app = create_app(state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
