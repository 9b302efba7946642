use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{
    GalleryDirectory, IdentityDirectory, InviteNotifier, InviteService, InviteStore, MemoryStore,
    StoreGateway,
};
use persistence::{GalleryRepository, IdentityRepository, InviteRepository};
use shared::jwt::{TokenError, TokenIssuer};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    canonical_host, metrics_handler, metrics_middleware, redeem_rate_limit, security_headers,
    trace_id, RateLimiterState,
};
use crate::routes::{auth, health, invites};
use crate::services::session::{HostCanonicalizer, SessionCookies};

/// Storage collaborators behind the access core.
#[derive(Clone)]
pub struct Backend {
    pub invites: Arc<dyn InviteStore>,
    pub galleries: Arc<dyn GalleryDirectory>,
    pub identities: Arc<dyn IdentityDirectory>,
    /// Present for the Postgres backend; used by health checks.
    pub pool: Option<PgPool>,
}

impl Backend {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            invites: Arc::new(InviteRepository::new(pool.clone())),
            galleries: Arc::new(GalleryRepository::new(pool.clone())),
            identities: Arc::new(IdentityRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            invites: store.clone(),
            galleries: store.clone(),
            identities: store,
            pool: None,
        }
    }

    pub fn name(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Backend,
    pub invites: Arc<InviteService>,
    pub tokens: Arc<TokenIssuer>,
    pub cookies: Arc<SessionCookies>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the access core. Fails only on an unusable signing secret.
    pub fn new(
        config: Config,
        backend: Backend,
        notifier: Arc<dyn InviteNotifier>,
    ) -> Result<Self, TokenError> {
        let tokens = TokenIssuer::from_secret(
            config.auth.token_secret.as_bytes(),
            config.auth.token_ttl_secs,
            config.auth.leeway_secs,
        )?;

        let invites = InviteService::new(
            backend.invites.clone(),
            backend.galleries.clone(),
            backend.identities.clone(),
            notifier,
            StoreGateway::new(config.storage.retry_policy()),
            config.server.public_base_url.clone(),
        );

        let rate_limiter =
            RateLimiterState::new(config.security.redeem_rate_limit_per_minute).map(Arc::new);
        let cookies = SessionCookies::new(&config.session);

        Ok(Self {
            config: Arc::new(config),
            backend,
            invites: Arc::new(invites),
            tokens: Arc::new(tokens),
            cookies: Arc::new(cookies),
            rate_limiter,
        })
    }

    pub fn gateway(&self) -> &StoreGateway {
        self.invites.gateway()
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Credentialed CORS needs explicit origins.
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ])
            .allow_credentials(true)
    };

    // Redemption is public and rate limited per client.
    let redeem_routes = Router::new()
        .route("/api/v1/invites/redeem", post(invites::redeem_invite))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            redeem_rate_limit,
        ));

    // Credential checks happen in the extractors.
    let api_routes = Router::new()
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/me", get(auth::me))
        .route(
            "/api/v1/galleries/:gallery_id/invites",
            post(invites::create_invite).get(invites::list_invites),
        )
        .route("/api/v1/invites/:invite_id", get(invites::get_invite))
        .route(
            "/api/v1/invites/:invite_id/revoke",
            post(invites::revoke_invite),
        )
        .route(
            "/api/v1/invites/:invite_id/resend",
            post(invites::resend_invite),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let router = Router::new()
        .merge(public_routes)
        .merge(redeem_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            config.session.environment,
            security_headers,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state);

    // Outermost: alias hosts never reach credential handling.
    match HostCanonicalizer::from_config(&config.session) {
        Some(canonicalizer) => router.layer(middleware::from_fn_with_state(
            Arc::new(canonicalizer),
            canonical_host,
        )),
        None => router,
    }
}
