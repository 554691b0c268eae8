use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{AuthError, RegisterInput, TokenPair},
    db::entities::user,
    error::AppError,
    routes::{ApiResult, AuthContext, JsonApiResponse, middleware::bearer_token},
    state::AppState,
};

pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub avatar_path: Option<String>,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    pub role_id: Option<Uuid>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            avatar_path: user.avatar_path,
            email_verified: user.email_verified,
            mfa_enabled: user.mfa_enabled,
            role_id: user.role_id,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub role: String,
    pub permissions: Vec<String>,
    pub provider: String,
    pub session_id: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

fn refresh_token_header(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::from(AuthError::RefreshTokenInvalid))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterInput>,
) -> ApiResult<UserResponse> {
    let user = state.sessions.register(body).await?;
    JsonApiResponse::created(user.into())
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<TokenPair> {
    let tokens = state.sessions.login(&body.email, &body.password).await?;
    JsonApiResponse::ok(tokens)
}

async fn refresh(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<TokenPair> {
    let access = bearer_token(&headers)?;
    let refresh = refresh_token_header(&headers)?;
    let tokens = state.sessions.refresh(access, refresh).await?;
    JsonApiResponse::ok(tokens)
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    let refresh = refresh_token_header(&headers)?;
    state.sessions.logout(refresh).await?;
    JsonApiResponse::ok(serde_json::Value::Null)
}

async fn me(State(state): State<Arc<AppState>>, ctx: AuthContext) -> ApiResult<MeResponse> {
    let identity = ctx.identity();
    let user = state.sessions.current_user(identity.user_id).await?;
    JsonApiResponse::ok(MeResponse {
        user: user.into(),
        role: identity.role.clone(),
        permissions: identity.permissions.clone(),
        provider: identity.provider.clone(),
        session_id: identity.session_id.clone(),
    })
}
