pub mod bootstrap;
pub mod error;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod random;
pub mod rbac;
pub mod session;
pub mod session_store;
pub mod timeout;
pub mod types;

pub use bootstrap::{AuthServices, Backends};
pub use error::AuthError;
pub use jwt::TokenService;
pub use oauth::{AuthorizationRequest, IdentityProvider, OAuthLinker, verify_state};
pub use rbac::{RbacResolver, RoleSnapshot};
pub use session::{RegisterInput, SessionManager, SessionSettings};
pub use session_store::{MemorySessionStore, SessionStore};
pub use types::{Claims, Identity, RefreshSession, TokenPair};
