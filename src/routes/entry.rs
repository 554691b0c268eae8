use std::sync::Arc;

use axum::{Router, middleware};

use crate::state::AppState;

use super::{api, json_error_middleware};

pub const API_PREFIX: &str = "/api/v1";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(API_PREFIX, api::router(state))
        .layer(middleware::from_fn(json_error_middleware))
}
