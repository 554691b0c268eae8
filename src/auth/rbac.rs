use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::error::AuthError;
use super::timeout::with_timeout;
use super::types::Identity;
use crate::db::directory::RbacStore;
use crate::db::entities::{permission, role, role_permission};

/// Role data embedded into an access token at issue time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSnapshot {
    pub role_id: Option<Uuid>,
    pub name: String,
    pub permissions: BTreeSet<String>,
}

impl RoleSnapshot {
    pub fn permission_list(&self) -> Vec<String> {
        self.permissions.iter().cloned().collect()
    }
}

fn checked_name(kind: &str, name: &str) -> Result<String, AuthError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AuthError::validation(format!("{kind} name must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Resolves roles to permission sets and fronts the RBAC admin surface.
#[derive(Clone)]
pub struct RbacResolver {
    store: Arc<dyn RbacStore>,
    io_timeout: Duration,
}

impl RbacResolver {
    pub fn new(store: Arc<dyn RbacStore>, io_timeout: Duration) -> Self {
        Self { store, io_timeout }
    }

    async fn require_role(&self, id: Uuid) -> Result<role::Model, AuthError> {
        with_timeout(self.io_timeout, "role lookup", self.store.find_role(id))
            .await?
            .ok_or_else(|| AuthError::not_found(format!("role {id}")))
    }

    async fn require_permission(&self, id: Uuid) -> Result<permission::Model, AuthError> {
        with_timeout(self.io_timeout, "permission lookup", self.store.find_permission(id))
            .await?
            .ok_or_else(|| AuthError::not_found(format!("permission {id}")))
    }

    pub async fn permissions_for_role(&self, role_id: Uuid) -> Result<BTreeSet<String>, AuthError> {
        self.require_role(role_id).await?;
        let permissions = with_timeout(
            self.io_timeout,
            "permission join",
            self.store.permissions_for_role(role_id),
        )
        .await?;
        Ok(permissions.into_iter().map(|p| p.name).collect())
    }

    pub async fn role_by_name(&self, name: &str) -> Result<Option<role::Model>, AuthError> {
        with_timeout(self.io_timeout, "role lookup", self.store.find_role_by_name(name)).await
    }

    pub async fn permissions_for_role_name(&self, name: &str) -> Result<BTreeSet<String>, AuthError> {
        let role = self
            .role_by_name(name)
            .await?
            .ok_or_else(|| AuthError::not_found(format!("role `{name}`")))?;
        let permissions = with_timeout(
            self.io_timeout,
            "permission join",
            self.store.permissions_for_role(role.id),
        )
        .await?;
        Ok(permissions.into_iter().map(|p| p.name).collect())
    }

    pub async fn roles_for_permission(&self, permission_id: Uuid) -> Result<Vec<role::Model>, AuthError> {
        self.require_permission(permission_id).await?;
        with_timeout(
            self.io_timeout,
            "role join",
            self.store.roles_for_permission(permission_id),
        )
        .await
    }

    /// A user without a role, or pointing at a role that no longer exists,
    /// gets an empty snapshot.
    pub async fn snapshot_for(&self, role_id: Option<Uuid>) -> Result<RoleSnapshot, AuthError> {
        let Some(role_id) = role_id else {
            return Ok(RoleSnapshot::default());
        };

        let Some(role) =
            with_timeout(self.io_timeout, "role lookup", self.store.find_role(role_id)).await?
        else {
            tracing::warn!(%role_id, "user references a missing role; issuing empty snapshot");
            return Ok(RoleSnapshot::default());
        };

        let permissions = with_timeout(
            self.io_timeout,
            "permission join",
            self.store.permissions_for_role(role.id),
        )
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

        Ok(RoleSnapshot {
            role_id: Some(role.id),
            name: role.name,
            permissions,
        })
    }

    /// Answers from the token snapshot alone; no store round trip.
    pub fn authorize(&self, identity: &Identity, permission: &str) -> Result<(), AuthError> {
        if identity.has_permission(permission) {
            return Ok(());
        }
        tracing::debug!(user_id = %identity.user_id, permission, "permission denied");
        Err(AuthError::Forbidden(permission.to_string()))
    }

    pub async fn list_roles(&self) -> Result<Vec<role::Model>, AuthError> {
        with_timeout(self.io_timeout, "role list", self.store.list_roles()).await
    }

    pub async fn get_role(&self, id: Uuid) -> Result<role::Model, AuthError> {
        self.require_role(id).await
    }

    pub async fn create_role(&self, name: &str) -> Result<role::Model, AuthError> {
        let name = checked_name("role", name)?;
        let created =
            with_timeout(self.io_timeout, "role create", self.store.create_role(&name)).await?;
        tracing::info!(role_id = %created.id, name = %created.name, "role created");
        Ok(created)
    }

    pub async fn update_role(&self, id: Uuid, name: &str) -> Result<role::Model, AuthError> {
        let name = checked_name("role", name)?;
        with_timeout(self.io_timeout, "role update", self.store.rename_role(id, &name)).await
    }

    pub async fn delete_role(&self, id: Uuid) -> Result<(), AuthError> {
        with_timeout(self.io_timeout, "role delete", self.store.delete_role(id)).await?;
        tracing::info!(role_id = %id, "role deleted");
        Ok(())
    }

    pub async fn list_permissions(&self) -> Result<Vec<permission::Model>, AuthError> {
        with_timeout(self.io_timeout, "permission list", self.store.list_permissions()).await
    }

    pub async fn get_permission(&self, id: Uuid) -> Result<permission::Model, AuthError> {
        self.require_permission(id).await
    }

    pub async fn create_permission(&self, name: &str) -> Result<permission::Model, AuthError> {
        let name = checked_name("permission", name)?;
        let created = with_timeout(
            self.io_timeout,
            "permission create",
            self.store.create_permission(&name),
        )
        .await?;
        tracing::info!(permission_id = %created.id, name = %created.name, "permission created");
        Ok(created)
    }

    pub async fn update_permission(&self, id: Uuid, name: &str) -> Result<permission::Model, AuthError> {
        let name = checked_name("permission", name)?;
        with_timeout(
            self.io_timeout,
            "permission update",
            self.store.rename_permission(id, &name),
        )
        .await
    }

    pub async fn delete_permission(&self, id: Uuid) -> Result<(), AuthError> {
        with_timeout(self.io_timeout, "permission delete", self.store.delete_permission(id))
            .await?;
        tracing::info!(permission_id = %id, "permission deleted");
        Ok(())
    }

    pub async fn list_role_permissions(&self) -> Result<Vec<role_permission::Model>, AuthError> {
        with_timeout(self.io_timeout, "grant list", self.store.list_role_permissions()).await
    }

    pub async fn get_role_permission(&self, id: Uuid) -> Result<role_permission::Model, AuthError> {
        with_timeout(self.io_timeout, "grant lookup", self.store.find_role_permission(id))
            .await?
            .ok_or_else(|| AuthError::not_found(format!("role_permission {id}")))
    }

    pub async fn create_role_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<role_permission::Model, AuthError> {
        let created = with_timeout(
            self.io_timeout,
            "grant create",
            self.store.create_role_permission(role_id, permission_id),
        )
        .await?;
        tracing::info!(%role_id, %permission_id, "permission granted");
        Ok(created)
    }

    pub async fn update_role_permission(
        &self,
        id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<role_permission::Model, AuthError> {
        with_timeout(
            self.io_timeout,
            "grant update",
            self.store.update_role_permission(id, role_id, permission_id),
        )
        .await
    }

    pub async fn delete_role_permission(&self, id: Uuid) -> Result<(), AuthError> {
        with_timeout(self.io_timeout, "grant delete", self.store.delete_role_permission(id)).await
    }
}
