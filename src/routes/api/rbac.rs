use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::entities::{permission, role, role_permission},
    routes::{ApiResult, JsonApiResponse, RbacManage, RequirePermission},
    state::AppState,
};

type ManageGuard = RequirePermission<RbacManage>;

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<role::Model> for RoleResponse {
    fn from(role: role::Model) -> Self {
        Self {
            id: role.id,
            name: role.name,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<permission::Model> for PermissionResponse {
    fn from(permission: permission::Model) -> Self {
        Self {
            id: permission.id,
            name: permission.name,
            created_at: permission.created_at,
            updated_at: permission.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RolePermissionResponse {
    pub id: Uuid,
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

impl From<role_permission::Model> for RolePermissionResponse {
    fn from(grant: role_permission::Model) -> Self {
        Self {
            id: grant.id,
            role_id: grant.role_id,
            permission_id: grant.permission_id,
        }
    }
}

/// Permission names granted to a role, sorted.
#[derive(Debug, Serialize)]
pub struct RolePermissionsResponse {
    pub role: String,
    pub permissions: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/{id}",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/roles/{id}/permissions", get(role_permissions))
        .route(
            "/roles/by-name/{name}/permissions",
            get(role_permissions_by_name),
        )
        .route("/permissions", get(list_permissions).post(create_permission))
        .route(
            "/permissions/{id}",
            get(get_permission)
                .put(update_permission)
                .delete(delete_permission),
        )
        .route("/permissions/{id}/roles", get(permission_roles))
        .route(
            "/role-permissions",
            get(list_role_permissions).post(create_role_permission),
        )
        .route(
            "/role-permissions/{id}",
            put(update_role_permission)
                .get(get_role_permission)
                .delete(delete_role_permission),
        )
        .with_state(state)
}

async fn list_roles(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
) -> ApiResult<Vec<RoleResponse>> {
    let roles = state.rbac.list_roles().await?;
    JsonApiResponse::ok(roles.into_iter().map(Into::into).collect())
}

async fn get_role(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<RoleResponse> {
    JsonApiResponse::ok(state.rbac.get_role(id).await?.into())
}

async fn create_role(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Json(body): Json<NameRequest>,
) -> ApiResult<RoleResponse> {
    JsonApiResponse::created(state.rbac.create_role(&body.name).await?.into())
}

async fn update_role(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
    Json(body): Json<NameRequest>,
) -> ApiResult<RoleResponse> {
    JsonApiResponse::ok(state.rbac.update_role(id, &body.name).await?.into())
}

async fn delete_role(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.rbac.delete_role(id).await?;
    JsonApiResponse::ok(serde_json::Value::Null)
}

async fn role_permissions(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<RolePermissionsResponse> {
    let role = state.rbac.get_role(id).await?;
    let permissions = state.rbac.permissions_for_role(id).await?;
    JsonApiResponse::ok(RolePermissionsResponse {
        role: role.name,
        permissions: permissions.into_iter().collect(),
    })
}

async fn role_permissions_by_name(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(name): Path<String>,
) -> ApiResult<RolePermissionsResponse> {
    let permissions = state.rbac.permissions_for_role_name(&name).await?;
    JsonApiResponse::ok(RolePermissionsResponse {
        role: name,
        permissions: permissions.into_iter().collect(),
    })
}

async fn list_permissions(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
) -> ApiResult<Vec<PermissionResponse>> {
    let permissions = state.rbac.list_permissions().await?;
    JsonApiResponse::ok(permissions.into_iter().map(Into::into).collect())
}

async fn get_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<PermissionResponse> {
    JsonApiResponse::ok(state.rbac.get_permission(id).await?.into())
}

async fn create_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Json(body): Json<NameRequest>,
) -> ApiResult<PermissionResponse> {
    JsonApiResponse::created(state.rbac.create_permission(&body.name).await?.into())
}

async fn update_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
    Json(body): Json<NameRequest>,
) -> ApiResult<PermissionResponse> {
    JsonApiResponse::ok(state.rbac.update_permission(id, &body.name).await?.into())
}

async fn delete_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.rbac.delete_permission(id).await?;
    JsonApiResponse::ok(serde_json::Value::Null)
}

async fn permission_roles(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<RoleResponse>> {
    let roles = state.rbac.roles_for_permission(id).await?;
    JsonApiResponse::ok(roles.into_iter().map(Into::into).collect())
}

async fn list_role_permissions(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
) -> ApiResult<Vec<RolePermissionResponse>> {
    let grants = state.rbac.list_role_permissions().await?;
    JsonApiResponse::ok(grants.into_iter().map(Into::into).collect())
}

async fn get_role_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<RolePermissionResponse> {
    JsonApiResponse::ok(state.rbac.get_role_permission(id).await?.into())
}

async fn create_role_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Json(body): Json<GrantRequest>,
) -> ApiResult<RolePermissionResponse> {
    let grant = state
        .rbac
        .create_role_permission(body.role_id, body.permission_id)
        .await?;
    JsonApiResponse::created(grant.into())
}

async fn update_role_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
    Json(body): Json<GrantRequest>,
) -> ApiResult<RolePermissionResponse> {
    let grant = state
        .rbac
        .update_role_permission(id, body.role_id, body.permission_id)
        .await?;
    JsonApiResponse::ok(grant.into())
}

async fn delete_role_permission(
    State(state): State<Arc<AppState>>,
    _guard: ManageGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.rbac.delete_role_permission(id).await?;
    JsonApiResponse::ok(serde_json::Value::Null)
}
