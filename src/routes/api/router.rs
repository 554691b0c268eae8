use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

use super::{auth, oauth, rbac};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/auth", auth::router(state.clone()).merge(oauth::router(state.clone())))
        .nest("/rbac", rbac::router(state))
}
