pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: i64 = 3000;
pub const DEFAULT_RUST_LOG: &str = "info,tower_http=info";
pub const DEFAULT_DB_MAX_CONNECTIONS: i64 = 10;
pub const DEFAULT_DB_MIN_IDLE: i64 = 2;

pub const DEFAULT_ROLE: &str = "user";
pub const ADMIN_ROLE: &str = "admin";
pub const RBAC_MANAGE_PERMISSION: &str = "rbac:manage";
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 300;

pub const DEFAULT_OAUTH_PROVIDER: &str = "google";
pub const DEFAULT_OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_OAUTH_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub const DEFAULT_OAUTH_SCOPES: &str = "openid email profile";
