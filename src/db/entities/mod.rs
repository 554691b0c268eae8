#[allow(unused_imports)]
pub mod prelude {
    pub use super::oauth_provider::Entity as OAuthProvider;
    pub use super::permission::Entity as Permission;
    pub use super::refresh_session::Entity as RefreshSession;
    pub use super::role::Entity as Role;
    pub use super::role_permission::Entity as RolePermission;
    pub use super::user::Entity as User;
}

pub mod oauth_provider;
pub mod permission;
pub mod refresh_session;
pub mod role;
pub mod role_permission;
pub mod user;
