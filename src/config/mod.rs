pub mod configs;
pub mod defaults;
pub mod envconfig;
pub mod validate;

pub use configs::{
    AppConfig, AuthConfig, DatabaseConfig, GeneralConfig, LoggingConfig, OAuthConfig,
    SessionStoreKind,
};
pub use envconfig::EnvConfig;
