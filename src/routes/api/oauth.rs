use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;

use crate::{
    auth::{AuthorizationRequest, OAuthLinker, TokenPair, verify_state},
    error::AppError,
    routes::{ApiResult, JsonApiResponse},
    state::AppState,
};

/// Echo of the `state` handed out by `/oauth/authorize`.
pub const OAUTH_STATE_HEADER: &str = "x-oauth-state";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/oauth/authorize", get(authorize))
        .route("/oauth/callback", get(callback))
        .with_state(state)
}

fn linker(state: &AppState) -> Result<&OAuthLinker, AppError> {
    state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::not_found("oauth login is not configured"))
}

async fn authorize(State(state): State<Arc<AppState>>) -> ApiResult<AuthorizationRequest> {
    let request = linker(&state)?.authorization_request()?;
    JsonApiResponse::ok(request)
}

async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<TokenPair> {
    let linker = linker(&state)?;
    let expected = headers
        .get(OAUTH_STATE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    verify_state(expected, &query.state)?;

    let tokens = linker.complete(&query.code).await?;
    JsonApiResponse::ok(tokens)
}
