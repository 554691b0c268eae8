//! Persistence boundaries consumed by the auth core.
//!
//! Every trait has two implementations: the sea-orm DAOs under `db::dao` and
//! the in-memory [`MemoryDirectory`](super::memory::MemoryDirectory).

use async_trait::async_trait;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::dao::DaoResult;
use super::entities::{oauth_provider, permission, role, role_permission, user};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: String,
    pub avatar_path: Option<String>,
    pub email_verified: bool,
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOAuthCredential {
    pub provider: String,
    pub provider_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTimeWithTimeZone>,
}

/// Lookups never return soft-deleted users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>>;
    async fn find_by_id(&self, id: Uuid) -> DaoResult<Option<user::Model>>;
    async fn create(&self, user: NewUser) -> DaoResult<user::Model>;
    async fn update(&self, user: user::Model) -> DaoResult<user::Model>;
    async fn email_exists(&self, email: &str) -> DaoResult<bool>;
    async fn soft_delete(&self, id: Uuid) -> DaoResult<()>;
}

#[async_trait]
pub trait RbacStore: Send + Sync {
    async fn list_roles(&self) -> DaoResult<Vec<role::Model>>;
    async fn find_role(&self, id: Uuid) -> DaoResult<Option<role::Model>>;
    async fn find_role_by_name(&self, name: &str) -> DaoResult<Option<role::Model>>;
    async fn create_role(&self, name: &str) -> DaoResult<role::Model>;
    async fn rename_role(&self, id: Uuid, name: &str) -> DaoResult<role::Model>;
    async fn delete_role(&self, id: Uuid) -> DaoResult<()>;

    async fn list_permissions(&self) -> DaoResult<Vec<permission::Model>>;
    async fn find_permission(&self, id: Uuid) -> DaoResult<Option<permission::Model>>;
    async fn find_permission_by_name(&self, name: &str) -> DaoResult<Option<permission::Model>>;
    async fn create_permission(&self, name: &str) -> DaoResult<permission::Model>;
    async fn rename_permission(&self, id: Uuid, name: &str) -> DaoResult<permission::Model>;
    async fn delete_permission(&self, id: Uuid) -> DaoResult<()>;

    async fn list_role_permissions(&self) -> DaoResult<Vec<role_permission::Model>>;
    async fn find_role_permission(&self, id: Uuid) -> DaoResult<Option<role_permission::Model>>;
    async fn find_grant(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<Option<role_permission::Model>>;
    async fn create_role_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<role_permission::Model>;
    async fn update_role_permission(
        &self,
        id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<role_permission::Model>;
    async fn delete_role_permission(&self, id: Uuid) -> DaoResult<()>;

    /// Permissions granted to `role_id` through the join table.
    async fn permissions_for_role(&self, role_id: Uuid) -> DaoResult<Vec<permission::Model>>;
    /// Roles holding `permission_id` through the join table.
    async fn roles_for_permission(&self, permission_id: Uuid) -> DaoResult<Vec<role::Model>>;
}

#[async_trait]
pub trait OAuthCredentialStore: Send + Sync {
    async fn find(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> DaoResult<Option<oauth_provider::Model>>;

    /// Inserts a credential, or updates the existing one for the same
    /// `(user_id, provider)` pair.
    async fn create(
        &self,
        user_id: Uuid,
        credential: NewOAuthCredential,
    ) -> DaoResult<oauth_provider::Model>;

    async fn update(&self, credential: oauth_provider::Model)
    -> DaoResult<oauth_provider::Model>;

    /// Creates a user and its first credential atomically.
    async fn create_user_with_credential(
        &self,
        user: NewUser,
        credential: NewOAuthCredential,
    ) -> DaoResult<(user::Model, oauth_provider::Model)>;
}
