use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{defaults, envconfig::EnvConfig, validate};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub database: Option<DatabaseConfig>,
    pub auth: Option<AuthConfig>,
    pub oauth: Option<OAuthConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        <Self as EnvConfig>::from_env()
    }
}

impl EnvConfig for AppConfig {
    fn validate(&self) -> Result<()> {
        validate::validate(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT as u16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_db_min_idle")]
    pub min_idle: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    #[default]
    Memory,
    Database,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub admin_email: String,
    pub admin_password: String,
    #[serde(default = "default_role")]
    pub default_role: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    #[serde(default)]
    pub session_store: SessionStoreKind,
    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
}

impl AuthConfig {
    /// Config with every tunable at its default.
    pub fn new(
        jwt_secret: impl Into<String>,
        admin_email: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            admin_email: admin_email.into(),
            admin_password: admin_password.into(),
            default_role: default_role(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
            io_timeout_ms: default_io_timeout_ms(),
            session_store: SessionStoreKind::default(),
            session_sweep_interval_secs: default_session_sweep_interval_secs(),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// `None` disables the expired-session sweep.
    pub fn session_sweep_interval(&self) -> Option<Duration> {
        (self.session_sweep_interval_secs > 0)
            .then(|| Duration::from_secs(self.session_sweep_interval_secs))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthConfig {
    #[serde(default = "default_oauth_provider")]
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    #[serde(default = "default_oauth_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_oauth_token_url")]
    pub token_url: String,
    #[serde(default = "default_oauth_userinfo_url")]
    pub userinfo_url: String,
    /// Space separated.
    #[serde(default = "default_oauth_scopes")]
    pub scopes: String,
}

impl OAuthConfig {
    pub fn scope_list(&self) -> Vec<String> {
        self.scopes.split_whitespace().map(str::to_string).collect()
    }
}

fn default_db_max_connections() -> u32 {
    defaults::DEFAULT_DB_MAX_CONNECTIONS as u32
}

fn default_db_min_idle() -> u32 {
    defaults::DEFAULT_DB_MIN_IDLE as u32
}

fn default_role() -> String {
    defaults::DEFAULT_ROLE.to_string()
}

fn default_access_ttl_secs() -> u64 {
    defaults::DEFAULT_ACCESS_TTL_SECS
}

fn default_refresh_ttl_secs() -> u64 {
    defaults::DEFAULT_REFRESH_TTL_SECS
}

fn default_io_timeout_ms() -> u64 {
    defaults::DEFAULT_IO_TIMEOUT_MS
}

fn default_session_sweep_interval_secs() -> u64 {
    defaults::DEFAULT_SESSION_SWEEP_INTERVAL_SECS
}

fn default_oauth_provider() -> String {
    defaults::DEFAULT_OAUTH_PROVIDER.to_string()
}

fn default_oauth_auth_url() -> String {
    defaults::DEFAULT_OAUTH_AUTH_URL.to_string()
}

fn default_oauth_token_url() -> String {
    defaults::DEFAULT_OAUTH_TOKEN_URL.to_string()
}

fn default_oauth_userinfo_url() -> String {
    defaults::DEFAULT_OAUTH_USERINFO_URL.to_string()
}

fn default_oauth_scopes() -> String {
    defaults::DEFAULT_OAUTH_SCOPES.to_string()
}
