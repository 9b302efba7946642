//! Common test utilities for integration tests.
//!
//! The application is wired against the in-memory backend, so these tests
//! need no external services.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::Response,
    Router,
};
use domain::models::{Gallery, Identity, NewIdentity};
use domain::services::{MemoryStore, MockInviteNotifier};
use fake::faker::company::en::CompanyName;
use fake::Fake;
use proofroom_api::{
    app::{create_app, AppState, Backend},
    config::{
        AuthConfig, Config, DatabaseConfig, EmailConfig, LoggingConfig, SecurityConfig,
        ServerConfig, SessionConfig, StorageBackend, StorageConfig,
    },
};
use shared::capability::Role;
use shared::password::hash_password;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdefghij";
pub const TEST_PASSWORD: &str = "SecureP@ss123!";

/// Create a test configuration.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            public_base_url: "http://localhost:8080".to_string(),
        },
        database: DatabaseConfig::default(),
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            attempt_timeout_ms: 1_000,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
        auth: AuthConfig {
            token_secret: TEST_SECRET.to_string(),
            token_ttl_secs: 3600,
            leeway_secs: 0,
            bootstrap_email: String::new(),
            bootstrap_password: String::new(),
        },
        session: SessionConfig::default(),
        security: SecurityConfig {
            cors_origins: vec![],
            // Disabled unless a test opts in.
            redeem_rate_limit_per_minute: 0,
        },
        email: EmailConfig::default(),
    }
}

/// A wired application plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MockInviteNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, MockInviteNotifier::new())
    }

    /// Application whose notifier rejects every notification.
    pub fn with_failing_notifier() -> Self {
        Self::build(test_config(), MockInviteNotifier::failing())
    }

    fn build(config: Config, notifier: MockInviteNotifier) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let state = AppState::new(config, Backend::memory(store.clone()), notifier.clone())
            .expect("test secret is valid");
        let router = create_app(state.clone());

        Self {
            router,
            state,
            store,
            notifier,
        }
    }

    /// Adds a password-capable identity with the given role.
    pub async fn create_identity(&self, role: Role) -> Identity {
        self.store
            .add_identity(NewIdentity {
                email: unique_test_email(),
                role,
                display_name: CompanyName().fake(),
                password_hash: Some(hash_password(TEST_PASSWORD).expect("hash password")),
            })
            .await
    }

    /// Adds an owner together with one gallery they own.
    pub async fn create_owner_with_gallery(&self) -> (Identity, Gallery) {
        let owner = self.create_identity(Role::Owner).await;
        let title = format!("{} Wedding", CompanyName().fake::<String>());
        let gallery = self.store.add_gallery(owner.id, &title).await;
        (owner, gallery)
    }

    /// Signs `identity` in through the login endpoint and returns the bearer token.
    pub async fn login(&self, identity: &Identity) -> String {
        let response = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({
                    "email": identity.email,
                    "password": TEST_PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed");
        let body = parse_response_body(response).await;
        body["token"]
            .as_str()
            .unwrap_or_else(|| panic!("Missing token in login response: {}", body))
            .to_string()
    }

    /// Creates an invite through the API and returns the response body.
    pub async fn create_invite(
        &self,
        token: &str,
        gallery_id: uuid::Uuid,
        body: serde_json::Value,
    ) -> serde_json::Value {
        let response = self
            .send(
                Method::POST,
                &format!("/api/v1/galleries/{}/invites", gallery_id),
                Some(token),
                Some(body),
            )
            .await;
        let status = response.status();
        let body = parse_response_body(response).await;
        assert_eq!(status, StatusCode::CREATED, "create invite failed: {}", body);
        body
    }

    /// Redeems an invite by code.
    pub async fn redeem(&self, code: &str) -> Response {
        self.send(
            Method::POST,
            "/api/v1/invites/redeem",
            None,
            Some(serde_json::json!({ "code": code })),
        )
        .await
    }

    /// Sends a request with an optional bearer token and JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.oneshot(request).await
    }

    pub async fn oneshot(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a unique email for testing.
pub fn unique_test_email() -> String {
    format!("test_{}@example.com", uuid::Uuid::new_v4())
}

pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

/// Every Set-Cookie value on a response.
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The `name=value` pair of the first Set-Cookie, usable as a Cookie header.
pub fn session_cookie_pair(headers: &HeaderMap) -> Option<String> {
    set_cookies(headers)
        .into_iter()
        .next()
        .and_then(|cookie| cookie.split(';').next().map(str::to_string))
}
