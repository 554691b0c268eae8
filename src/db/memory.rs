use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::dao::{DaoLayerError, DaoResult};
use super::directory::{NewOAuthCredential, NewUser, OAuthCredentialStore, RbacStore, UserDirectory};
use super::entities::{oauth_provider, permission, role, role_permission, user};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, user::Model>,
    roles: HashMap<Uuid, role::Model>,
    permissions: HashMap<Uuid, permission::Model>,
    grants: HashMap<Uuid, role_permission::Model>,
    credentials: HashMap<Uuid, oauth_provider::Model>,
}

/// In-memory stand-in for every directory trait, used without a database.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<RwLock<State>>,
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

fn name_taken(entity: &'static str, name: &str) -> DaoLayerError {
    DaoLayerError::conflict(entity, format!("name `{name}` already exists"))
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DaoResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DaoLayerError::Unavailable("directory lock poisoned".to_string()))
    }

    fn write(&self) -> DaoResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DaoLayerError::Unavailable("directory lock poisoned".to_string()))
    }
}

impl State {
    fn live_user_by_email(&self, email: &str) -> Option<&user::Model> {
        self.users
            .values()
            .find(|u| u.deleted_at.is_none() && u.email == email)
    }

    fn insert_user(&mut self, new: NewUser) -> DaoResult<user::Model> {
        if self.users.values().any(|u| u.email == new.email) {
            return Err(DaoLayerError::conflict(
                "user",
                format!("email `{}` already exists", new.email),
            ));
        }
        let ts = now();
        let model = user::Model {
            id: Uuid::new_v4(),
            created_at: ts,
            updated_at: ts,
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            avatar_path: new.avatar_path,
            email_verified: new.email_verified,
            mfa_enabled: false,
            mfa_secret: None,
            role_id: new.role_id,
            deleted_at: None,
        };
        self.users.insert(model.id, model.clone());
        Ok(model)
    }

    fn insert_credential(
        &mut self,
        user_id: Uuid,
        credential: NewOAuthCredential,
    ) -> oauth_provider::Model {
        let ts = now();
        if let Some(existing) = self
            .credentials
            .values_mut()
            .find(|c| c.user_id == user_id && c.provider == credential.provider)
        {
            existing.provider_id = credential.provider_id;
            existing.access_token = credential.access_token;
            existing.refresh_token = credential.refresh_token;
            existing.expires_at = credential.expires_at;
            existing.updated_at = ts;
            return existing.clone();
        }
        let model = oauth_provider::Model {
            id: Uuid::new_v4(),
            created_at: ts,
            updated_at: ts,
            user_id,
            provider: credential.provider,
            provider_id: credential.provider_id,
            access_token: credential.access_token,
            refresh_token: credential.refresh_token,
            expires_at: credential.expires_at,
        };
        self.credentials.insert(model.id, model.clone());
        model
    }

    fn check_grant(
        &self,
        id: Option<Uuid>,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<()> {
        if !self.roles.contains_key(&role_id) {
            return Err(DaoLayerError::NotFound {
                entity: "role",
                id: role_id,
            });
        }
        if !self.permissions.contains_key(&permission_id) {
            return Err(DaoLayerError::NotFound {
                entity: "permission",
                id: permission_id,
            });
        }
        let duplicate = self.grants.values().any(|g| {
            Some(g.id) != id && g.role_id == role_id && g.permission_id == permission_id
        });
        if duplicate {
            return Err(DaoLayerError::conflict(
                "role_permission",
                "permission already granted to role",
            ));
        }
        Ok(())
    }
}

fn sorted_by_name<T>(mut items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        Ok(self.read()?.live_user_by_email(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DaoResult<Option<user::Model>> {
        Ok(self
            .read()?
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn create(&self, new: NewUser) -> DaoResult<user::Model> {
        self.write()?.insert_user(new)
    }

    async fn update(&self, changed: user::Model) -> DaoResult<user::Model> {
        let mut state = self.write()?;
        if state
            .users
            .values()
            .any(|u| u.id != changed.id && u.email == changed.email)
        {
            return Err(DaoLayerError::conflict(
                "user",
                format!("email `{}` already exists", changed.email),
            ));
        }
        let stored = state
            .users
            .get_mut(&changed.id)
            .ok_or(DaoLayerError::NotFound {
                entity: "user",
                id: changed.id,
            })?;
        let created_at = stored.created_at;
        *stored = user::Model {
            created_at,
            updated_at: now(),
            ..changed
        };
        Ok(stored.clone())
    }

    async fn email_exists(&self, email: &str) -> DaoResult<bool> {
        Ok(self.read()?.live_user_by_email(email).is_some())
    }

    async fn soft_delete(&self, id: Uuid) -> DaoResult<()> {
        let mut state = self.write()?;
        let stored = state
            .users
            .get_mut(&id)
            .ok_or(DaoLayerError::NotFound { entity: "user", id })?;
        let ts = now();
        stored.deleted_at = Some(ts);
        stored.updated_at = ts;
        Ok(())
    }
}

#[async_trait]
impl RbacStore for MemoryDirectory {
    async fn list_roles(&self) -> DaoResult<Vec<role::Model>> {
        let roles = self.read()?.roles.values().cloned().collect();
        Ok(sorted_by_name(roles, |r: &role::Model| r.name.as_str()))
    }

    async fn find_role(&self, id: Uuid) -> DaoResult<Option<role::Model>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> DaoResult<Option<role::Model>> {
        Ok(self
            .read()?
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn create_role(&self, name: &str) -> DaoResult<role::Model> {
        let mut state = self.write()?;
        if state.roles.values().any(|r| r.name == name) {
            return Err(name_taken("role", name));
        }
        let ts = now();
        let model = role::Model {
            id: Uuid::new_v4(),
            created_at: ts,
            updated_at: ts,
            name: name.to_string(),
        };
        state.roles.insert(model.id, model.clone());
        Ok(model)
    }

    async fn rename_role(&self, id: Uuid, name: &str) -> DaoResult<role::Model> {
        let mut state = self.write()?;
        if state.roles.values().any(|r| r.id != id && r.name == name) {
            return Err(name_taken("role", name));
        }
        let stored = state
            .roles
            .get_mut(&id)
            .ok_or(DaoLayerError::NotFound { entity: "role", id })?;
        stored.name = name.to_string();
        stored.updated_at = now();
        Ok(stored.clone())
    }

    async fn delete_role(&self, id: Uuid) -> DaoResult<()> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&id) {
            return Err(DaoLayerError::NotFound { entity: "role", id });
        }
        let referenced = state.grants.values().filter(|g| g.role_id == id).count();
        if referenced > 0 {
            return Err(DaoLayerError::conflict(
                "role",
                format!("still granted {referenced} permission(s)"),
            ));
        }
        state.roles.remove(&id);
        Ok(())
    }

    async fn list_permissions(&self) -> DaoResult<Vec<permission::Model>> {
        let permissions = self.read()?.permissions.values().cloned().collect();
        Ok(sorted_by_name(permissions, |p: &permission::Model| {
            p.name.as_str()
        }))
    }

    async fn find_permission(&self, id: Uuid) -> DaoResult<Option<permission::Model>> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> DaoResult<Option<permission::Model>> {
        Ok(self
            .read()?
            .permissions
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn create_permission(&self, name: &str) -> DaoResult<permission::Model> {
        let mut state = self.write()?;
        if state.permissions.values().any(|p| p.name == name) {
            return Err(name_taken("permission", name));
        }
        let ts = now();
        let model = permission::Model {
            id: Uuid::new_v4(),
            created_at: ts,
            updated_at: ts,
            name: name.to_string(),
        };
        state.permissions.insert(model.id, model.clone());
        Ok(model)
    }

    async fn rename_permission(&self, id: Uuid, name: &str) -> DaoResult<permission::Model> {
        let mut state = self.write()?;
        if state.permissions.values().any(|p| p.id != id && p.name == name) {
            return Err(name_taken("permission", name));
        }
        let stored = state
            .permissions
            .get_mut(&id)
            .ok_or(DaoLayerError::NotFound {
                entity: "permission",
                id,
            })?;
        stored.name = name.to_string();
        stored.updated_at = now();
        Ok(stored.clone())
    }

    async fn delete_permission(&self, id: Uuid) -> DaoResult<()> {
        let mut state = self.write()?;
        if !state.permissions.contains_key(&id) {
            return Err(DaoLayerError::NotFound {
                entity: "permission",
                id,
            });
        }
        let referenced = state
            .grants
            .values()
            .filter(|g| g.permission_id == id)
            .count();
        if referenced > 0 {
            return Err(DaoLayerError::conflict(
                "permission",
                format!("still granted to {referenced} role(s)"),
            ));
        }
        state.permissions.remove(&id);
        Ok(())
    }

    async fn list_role_permissions(&self) -> DaoResult<Vec<role_permission::Model>> {
        let mut grants: Vec<_> = self.read()?.grants.values().cloned().collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn find_role_permission(&self, id: Uuid) -> DaoResult<Option<role_permission::Model>> {
        Ok(self.read()?.grants.get(&id).cloned())
    }

    async fn find_grant(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<Option<role_permission::Model>> {
        Ok(self
            .read()?
            .grants
            .values()
            .find(|g| g.role_id == role_id && g.permission_id == permission_id)
            .cloned())
    }

    async fn create_role_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<role_permission::Model> {
        let mut state = self.write()?;
        state.check_grant(None, role_id, permission_id)?;
        let ts = now();
        let model = role_permission::Model {
            id: Uuid::new_v4(),
            created_at: ts,
            updated_at: ts,
            role_id,
            permission_id,
        };
        state.grants.insert(model.id, model.clone());
        Ok(model)
    }

    async fn update_role_permission(
        &self,
        id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> DaoResult<role_permission::Model> {
        let mut state = self.write()?;
        if !state.grants.contains_key(&id) {
            return Err(DaoLayerError::NotFound {
                entity: "role_permission",
                id,
            });
        }
        state.check_grant(Some(id), role_id, permission_id)?;
        let stored = state
            .grants
            .get_mut(&id)
            .ok_or(DaoLayerError::NotFound {
                entity: "role_permission",
                id,
            })?;
        stored.role_id = role_id;
        stored.permission_id = permission_id;
        stored.updated_at = now();
        Ok(stored.clone())
    }

    async fn delete_role_permission(&self, id: Uuid) -> DaoResult<()> {
        self.write()?
            .grants
            .remove(&id)
            .map(|_| ())
            .ok_or(DaoLayerError::NotFound {
                entity: "role_permission",
                id,
            })
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> DaoResult<Vec<permission::Model>> {
        let state = self.read()?;
        let permissions = state
            .grants
            .values()
            .filter(|g| g.role_id == role_id)
            .filter_map(|g| state.permissions.get(&g.permission_id).cloned())
            .collect();
        Ok(sorted_by_name(permissions, |p: &permission::Model| {
            p.name.as_str()
        }))
    }

    async fn roles_for_permission(&self, permission_id: Uuid) -> DaoResult<Vec<role::Model>> {
        let state = self.read()?;
        let roles = state
            .grants
            .values()
            .filter(|g| g.permission_id == permission_id)
            .filter_map(|g| state.roles.get(&g.role_id).cloned())
            .collect();
        Ok(sorted_by_name(roles, |r: &role::Model| r.name.as_str()))
    }
}

#[async_trait]
impl OAuthCredentialStore for MemoryDirectory {
    async fn find(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> DaoResult<Option<oauth_provider::Model>> {
        Ok(self
            .read()?
            .credentials
            .values()
            .find(|c| c.user_id == user_id && c.provider == provider)
            .cloned())
    }

    async fn create(
        &self,
        user_id: Uuid,
        credential: NewOAuthCredential,
    ) -> DaoResult<oauth_provider::Model> {
        let mut state = self.write()?;
        if !state.users.contains_key(&user_id) {
            return Err(DaoLayerError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        Ok(state.insert_credential(user_id, credential))
    }

    async fn update(
        &self,
        credential: oauth_provider::Model,
    ) -> DaoResult<oauth_provider::Model> {
        let mut state = self.write()?;
        let stored = state
            .credentials
            .get_mut(&credential.id)
            .ok_or(DaoLayerError::NotFound {
                entity: "oauth_provider",
                id: credential.id,
            })?;
        let created_at = stored.created_at;
        *stored = oauth_provider::Model {
            created_at,
            updated_at: now(),
            ..credential
        };
        Ok(stored.clone())
    }

    async fn create_user_with_credential(
        &self,
        new_user: NewUser,
        credential: NewOAuthCredential,
    ) -> DaoResult<(user::Model, oauth_provider::Model)> {
        // One write guard covers both inserts.
        let mut state = self.write()?;
        let created = state.insert_user(new_user)?;
        let linked = state.insert_credential(created.id, credential);
        Ok((created, linked))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::MemoryDirectory;
    use crate::db::dao::DaoLayerError;
    use crate::db::directory::{
        NewOAuthCredential, NewUser, OAuthCredentialStore, RbacStore, UserDirectory,
    };

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: Some("hash".to_string()),
            full_name: "Alice".to_string(),
            avatar_path: None,
            email_verified: false,
            role_id: None,
        }
    }

    fn credential(access_token: &str) -> NewOAuthCredential {
        NewOAuthCredential {
            provider: "google".to_string(),
            provider_id: "g-1".to_string(),
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let directory = MemoryDirectory::new();
        UserDirectory::create(&directory, new_user("a@x.com"))
            .await
            .expect("first create");

        let err = UserDirectory::create(&directory, new_user("a@x.com"))
            .await
            .expect_err("duplicate should fail");
        assert!(matches!(err, DaoLayerError::Conflict { entity: "user", .. }));
    }

    #[tokio::test]
    async fn soft_deleted_users_are_invisible() {
        let directory = MemoryDirectory::new();
        let user = UserDirectory::create(&directory, new_user("gone@x.com"))
            .await
            .expect("create");
        directory.soft_delete(user.id).await.expect("soft delete");

        assert!(directory.find_by_email("gone@x.com").await.expect("lookup").is_none());
        assert!(UserDirectory::find_by_id(&directory, user.id)
            .await
            .expect("lookup")
            .is_none());
        assert!(!directory.email_exists("gone@x.com").await.expect("lookup"));
    }

    #[tokio::test]
    async fn strict_deletes_protect_granted_rows() {
        let directory = MemoryDirectory::new();
        let role = directory.create_role("editor").await.expect("role");
        let permission = directory
            .create_permission("articles:write")
            .await
            .expect("permission");
        let grant = directory
            .create_role_permission(role.id, permission.id)
            .await
            .expect("grant");

        assert!(matches!(
            directory.delete_role(role.id).await,
            Err(DaoLayerError::Conflict { .. })
        ));
        assert!(matches!(
            directory.delete_permission(permission.id).await,
            Err(DaoLayerError::Conflict { .. })
        ));

        directory.delete_role_permission(grant.id).await.expect("ungrant");
        directory.delete_role(role.id).await.expect("delete role");
        directory
            .delete_permission(permission.id)
            .await
            .expect("delete permission");
    }

    #[tokio::test]
    async fn grants_require_both_ends_and_are_unique() {
        let directory = MemoryDirectory::new();
        let role = directory.create_role("editor").await.expect("role");
        let missing = Uuid::new_v4();
        assert!(matches!(
            directory.create_role_permission(role.id, missing).await,
            Err(DaoLayerError::NotFound { entity: "permission", .. })
        ));

        let permission = directory
            .create_permission("articles:read")
            .await
            .expect("permission");
        directory
            .create_role_permission(role.id, permission.id)
            .await
            .expect("grant");
        assert!(matches!(
            directory.create_role_permission(role.id, permission.id).await,
            Err(DaoLayerError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn join_queries_follow_grants() {
        let directory = MemoryDirectory::new();
        let admin = directory.create_role("admin").await.expect("role");
        let editor = directory.create_role("editor").await.expect("role");
        let write = directory
            .create_permission("articles:write")
            .await
            .expect("permission");
        let read = directory
            .create_permission("articles:read")
            .await
            .expect("permission");
        for (role, permission) in [(admin.id, write.id), (admin.id, read.id), (editor.id, read.id)]
        {
            directory
                .create_role_permission(role, permission)
                .await
                .expect("grant");
        }

        let names: Vec<_> = directory
            .permissions_for_role(admin.id)
            .await
            .expect("join")
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["articles:read", "articles:write"]);

        let roles: Vec<_> = directory
            .roles_for_permission(read.id)
            .await
            .expect("join")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(roles, vec!["admin", "editor"]);
    }

    #[tokio::test]
    async fn credential_create_upserts_on_pair() {
        let directory = MemoryDirectory::new();
        let (user, first) = directory
            .create_user_with_credential(new_user("o@x.com"), credential("t1"))
            .await
            .expect("create");

        let second = OAuthCredentialStore::create(&directory, user.id, credential("t2"))
            .await
            .expect("upsert");
        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token, "t2");

        let found = OAuthCredentialStore::find(&directory, user.id, "google")
            .await
            .expect("find")
            .expect("credential");
        assert_eq!(found.access_token, "t2");
    }

    #[tokio::test]
    async fn create_user_with_credential_fails_whole_on_duplicate_email() {
        let directory = MemoryDirectory::new();
        UserDirectory::create(&directory, new_user("dup@x.com"))
            .await
            .expect("create");

        let err = directory
            .create_user_with_credential(new_user("dup@x.com"), credential("t"))
            .await
            .expect_err("duplicate should fail");
        assert!(matches!(err, DaoLayerError::Conflict { .. }));
        assert!(directory.read().expect("lock").credentials.is_empty());
    }
}
