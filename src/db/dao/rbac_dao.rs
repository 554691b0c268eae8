use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use super::{DaoBase, DaoLayerError, DaoResult};
use crate::db::directory::RbacStore;
use crate::db::entities::{
    permission,
    prelude::{Permission, Role, RolePermission},
    role, role_permission,
};

#[derive(Clone)]
pub struct RoleDao {
    db: DatabaseConnection,
}

impl DaoBase for RoleDao {
    type Entity = Role;
    const ENTITY_NAME: &'static str = "role";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Clone)]
pub struct PermissionDao {
    db: DatabaseConnection,
}

impl DaoBase for PermissionDao {
    type Entity = Permission;
    const ENTITY_NAME: &'static str = "permission";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Clone)]
pub struct RolePermissionDao {
    db: DatabaseConnection,
}

impl DaoBase for RolePermissionDao {
    type Entity = RolePermission;
    const ENTITY_NAME: &'static str = "role_permission";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Roles, permissions and the grants joining them.
///
/// Deletes are strict: a role or permission still referenced by a grant
/// cannot be removed until the grant is.
#[derive(Clone)]
pub struct RbacDao {
    roles: RoleDao,
    permissions: PermissionDao,
    grants: RolePermissionDao,
}

impl RbacDao {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self {
            roles: RoleDao::new(db),
            permissions: PermissionDao::new(db),
            grants: RolePermissionDao::new(db),
        }
    }

    async fn grants_where(
        &self,
        column: role_permission::Column,
        id: Uuid,
    ) -> DaoResult<Vec<role_permission::Model>> {
        self.grants
            .find_all(move |query| query.filter(column.eq(id)))
            .await
    }

    async fn ensure_grant_ends_exist(&self, role_id: Uuid, permission_id: Uuid) -> DaoResult<()> {
        self.roles.find_by_id(role_id).await?;
        self.permissions.find_by_id(permission_id).await?;
        Ok(())
    }
}

#[async_trait]
impl RbacStore for RbacDao {
    async fn list_roles(&self) -> DaoResult<Vec<role::Model>> {
        self.roles
            .find_all(|query| query.order_by_asc(role::Column::Name))
            .await
    }

    async fn find_role(&self, id: Uuid) -> DaoResult<Option<role::Model>> {
        self.roles.find_optional(id).await
    }

    async fn find_role_by_name(&self, name: &str) -> DaoResult<Option<role::Model>> {
        let name = name.to_string();
        self.roles
            .find_one(move |query| query.filter(role::Column::Name.eq(name)))
            .await
    }

    async fn create_role(&self, name: &str) -> DaoResult<role::Model> {
        if self.find_role_by_name(name).await?.is_some() {
            return Err(DaoLayerError::conflict(
                RoleDao::ENTITY_NAME,
                format!("name `{name}` already exists"),
            ));
        }
        self.roles
            .create(role::ActiveModel {
                name: Set(name.to_string()),
                ..Default::default()
            })
            .await
    }

    async fn rename_role(&self, id: Uuid, name: &str) -> DaoResult<role::Model> {
        if let Some(existing) = self.find_role_by_name(name).await?
            && existing.id != id
        {
            return Err(DaoLayerError::conflict(
                RoleDao::ENTITY_NAME,
                format!("name `{name}` already exists"),
            ));
        }
        let name = name.to_string();
        self.roles
            .update(id, move |active| active.name = Set(name))
            .await
    }

    async fn delete_role(&self, id: Uuid) -> DaoResult<()> {
        self.roles.find_by_id(id).await?;
        let grants = self.grants_where(role_permission::Column::RoleId, id).await?;
        if !grants.is_empty() {
            return Err(DaoLayerError::conflict(
                RoleDao::ENTITY_NAME,
                format!("still granted {} permission(s)", grants.len()),
            ));
        }
        self.roles.delete(id).await.map(|_| ())
    }

    async fn list_permissions(&self) -> DaoResult<Vec<permission::Model>> {
        self.permissions
            .find_all(|query| query.order_by_asc(permission::Column::Name))
            .await
    }

    async fn find_permission(&self, id: Uuid) -> DaoResult<Option<permission::Model>> {
        self.permissions.find_optional(id).await
    }

    async fn find_permission_by_name(&self, name: &str) -> DaoResult<Option<permission::Model>> {
        let name = name.to_string();
        self.permissions
            .find_one(move |query| query.filter(permission::Column::Name.eq(name)))
            .await
    }

    async fn create_permission(&self, name: &str) -> DaoResult<permission::Model> {
        if self.find_permission_by_name(name).await?.is_some() {
            return Err(DaoLayerError::conflict(
                PermissionDao::ENTITY_NAME,
                format!("name `{name}` already exists"),
            ));
        }
        self.permissions
            .create(permission::ActiveModel {
                name: Set(name.to_string()),
                ..Default::default()
            })
            .await
    }

    async fn rename_permission(&self, id: Uuid, name: &str) -> DaoResult<permission::Model> {
        if let Some(existing) = self.find_permission_by_name(name).await?
            && existing.id != id
        {
            return Err(DaoLayerError::conflict(
                PermissionDao::ENTITY_NAME,
                format!("name `{name}` already exists"),
            ));
        }
        let name = name.to_string();
        self.permissions
            .update(id, move |active| active.name = Set(name))
            .await
    }

    async fn delete_permission(&self, id: Uuid) -> DaoResult<()> {
        self.permissions.find_by_id(id).await?;
        let grants = self
            .grants_where(role_permission::Column::PermissionId, id)
            .await?;
        if !grants.is_empty() {
            return Err(DaoLayerError::conflict(
                PermissionDao::ENTITY_NAME,
                format!("still granted to {} role(s)", grants.len()),
            ));
        }
        self.permissions.delete(id).await.map(|_| ())
    }

    async fn list_role_permissions(&self) -> DaoResult<Vec<role_permission::Model>> {
        self.grants
            .find_all(|query| query.order_by_asc(role_permission::Column::CreatedAt))
            .await
    }

    async fn find_role_permission(&self, id: Uuid) -> DaoResult<Option<role_permission::Model>> {
        self.grants.find_optional(id).await
    }

    async fn find_grant(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<Option<role_permission::Model>> {
        self.grants
            .find_one(move |query| {
                query
                    .filter(role_permission::Column::RoleId.eq(role_id))
                    .filter(role_permission::Column::PermissionId.eq(permission_id))
            })
            .await
    }

    async fn create_role_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<role_permission::Model> {
        self.ensure_grant_ends_exist(role_id, permission_id).await?;
        if self.find_grant(role_id, permission_id).await?.is_some() {
            return Err(DaoLayerError::conflict(
                RolePermissionDao::ENTITY_NAME,
                "permission already granted to role",
            ));
        }
        self.grants
            .create(role_permission::ActiveModel {
                role_id: Set(role_id),
                permission_id: Set(permission_id),
                ..Default::default()
            })
            .await
    }

    async fn update_role_permission(
        &self,
        id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<role_permission::Model> {
        self.grants.find_by_id(id).await?;
        self.ensure_grant_ends_exist(role_id, permission_id).await?;
        if let Some(existing) = self.find_grant(role_id, permission_id).await?
            && existing.id != id
        {
            return Err(DaoLayerError::conflict(
                RolePermissionDao::ENTITY_NAME,
                "permission already granted to role",
            ));
        }
        self.grants
            .update(id, move |active| {
                active.role_id = Set(role_id);
                active.permission_id = Set(permission_id);
            })
            .await
    }

    async fn delete_role_permission(&self, id: Uuid) -> DaoResult<()> {
        self.grants.delete(id).await.map(|_| ())
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> DaoResult<Vec<permission::Model>> {
        let ids: Vec<Uuid> = self
            .grants_where(role_permission::Column::RoleId, role_id)
            .await?
            .into_iter()
            .map(|grant| grant.permission_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.permissions
            .find_all(move |query| {
                query
                    .filter(permission::Column::Id.is_in(ids))
                    .order_by_asc(permission::Column::Name)
            })
            .await
    }

    async fn roles_for_permission(&self, permission_id: Uuid) -> DaoResult<Vec<role::Model>> {
        let ids: Vec<Uuid> = self
            .grants_where(role_permission::Column::PermissionId, permission_id)
            .await?
            .into_iter()
            .map(|grant| grant.role_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.roles
            .find_all(move |query| {
                query
                    .filter(role::Column::Id.is_in(ids))
                    .order_by_asc(role::Column::Name)
            })
            .await
    }
}
