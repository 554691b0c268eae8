pub mod base;
pub mod base_traits;
mod context;
pub mod error;
pub mod oauth_provider_dao;
pub mod rbac_dao;
pub mod refresh_session_dao;
pub mod user_dao;

pub use base::DaoBase;
pub use base_traits::{HasIdActiveModel, TimestampedActiveModel};
pub use context::DaoContext;
pub use error::{DaoLayerError, DaoResult};
pub use oauth_provider_dao::OAuthProviderDao;
pub use rbac_dao::RbacDao;
pub use refresh_session_dao::RefreshSessionDao;
pub use user_dao::UserDao;
