use domain::services::RetryPolicy;
use serde::Deserialize;
use shared::jwt::MIN_SECRET_LEN;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Credential signing configuration
    pub auth: AuthConfig,
    /// Session cookie and host canonicalization
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Invite notification delivery
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Base of the access links sent to invite recipients.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

/// Which store backs invites, galleries and identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Single-process store; state is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// Attempt ceiling for one storage operation, including the first try.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl StorageConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens, at least 32 bytes.
    #[serde(default)]
    pub token_secret: String,

    /// Session token lifetime in seconds (default: 604800 = 7 days)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,

    /// Clock skew tolerance when checking expiry
    #[serde(default = "default_token_leeway")]
    pub leeway_secs: u64,

    /// Email of the administrator created on first start (optional)
    #[serde(default)]
    pub bootstrap_email: String,

    #[serde(default)]
    pub bootstrap_password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("bootstrap_email", &self.bootstrap_email)
            .field("bootstrap_password", &"[REDACTED]")
            .finish()
    }
}

/// Deployment environment. Drives cookie attributes and the redirect scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_environment")]
    pub environment: Environment,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Cookie Domain attribute; empty means host-only.
    #[serde(default)]
    pub cookie_domain: String,

    /// Host every request is redirected to; empty disables canonicalization.
    #[serde(default)]
    pub canonical_host: String,

    /// Extra host names redirected to the canonical host.
    #[serde(default)]
    pub host_aliases: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            cookie_name: default_cookie_name(),
            cookie_path: default_cookie_path(),
            cookie_domain: String::new(),
            canonical_host: String::new(),
            host_aliases: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Redemption attempts allowed per client address per minute; 0 disables the limit.
    #[serde(default = "default_redeem_rate_limit")]
    pub redeem_rate_limit_per_minute: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            redeem_rate_limit_per_minute: default_redeem_rate_limit(),
        }
    }
}

/// Email service configuration for invite notifications.
#[derive(Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: sendgrid or console (for development)
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("sendgrid_api_key", &"[REDACTED]")
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .finish()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Postgres
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_attempt_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_token_ttl() -> i64 {
    shared::jwt::DEFAULT_TOKEN_TTL_SECS
}

fn default_token_leeway() -> u64 {
    shared::jwt::DEFAULT_LEEWAY_SECS
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_cookie_name() -> String {
    "proofroom_session".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_redeem_rate_limit() -> u32 {
    30
}

fn default_email_provider() -> String {
    "console".to_string()
}

fn default_sender_email() -> String {
    "invites@proofroom.app".to_string()
}

fn default_sender_name() -> String {
    "Proofroom".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with PR__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("PR")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .with_list_parse_key("session.host_aliases")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults so tests do not depend on
    /// the working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30
            public_base_url = "http://localhost:8080"

            [database]
            url = ""

            [storage]
            backend = "memory"

            [logging]
            level = "info"
            format = "json"

            [auth]
            token_secret = "test-secret-test-secret-test-secret-0123"
            token_ttl_secs = 604800
            leeway_secs = 0

            [session]
            environment = "development"
            cookie_name = "proofroom_session"

            [security]
            cors_origins = []
            redeem_rate_limit_per_minute = 30

            [email]
            enabled = false
            provider = "console"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.auth.token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigValidationError::MissingRequired(format!(
                "PR__AUTH__TOKEN_SECRET must be set to at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        if self.auth.token_ttl_secs <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "token_ttl_secs must be positive".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "PR__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.storage.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "storage.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.storage.base_delay_ms > self.storage.max_delay_ms {
            return Err(ConfigValidationError::InvalidValue(
                "storage.base_delay_ms cannot exceed storage.max_delay_ms".to_string(),
            ));
        }

        if !self.session.cookie_path.starts_with('/') {
            return Err(ConfigValidationError::InvalidValue(
                "session.cookie_path must start with '/'".to_string(),
            ));
        }

        let canonical = self.session.canonical_host.to_ascii_lowercase();
        if !canonical.is_empty()
            && self
                .session
                .host_aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(&canonical))
        {
            return Err(ConfigValidationError::InvalidValue(
                "session.host_aliases cannot contain the canonical host".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
