use std::sync::Arc;

use axum::Router;

use crate::{
    auth::{AuthServices, Backends, IdentityProvider, bootstrap::seed},
    config::{AppConfig, AuthConfig},
    routes::router,
    state::AppState,
};

pub const TEST_ADMIN_EMAIL: &str = "admin@example.com";
pub const TEST_ADMIN_PASSWORD: &str = "admin-password";

pub fn test_auth_config(secret: &str) -> AuthConfig {
    AuthConfig::new(secret, TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD)
}

/// Seeded in-memory state, optionally with a stand-in identity provider.
pub async fn test_state(
    secret: &str,
    provider: Option<Arc<dyn IdentityProvider>>,
) -> anyhow::Result<Arc<AppState>> {
    let auth = test_auth_config(secret);
    let cfg = AppConfig {
        auth: Some(auth.clone()),
        ..AppConfig::default()
    };
    let backends = Backends::in_memory();
    seed(&auth, &backends).await?;
    let services = AuthServices::assemble(&auth, provider, backends);
    Ok(AppState::new(cfg, services))
}

pub async fn test_router(secret: &str) -> anyhow::Result<Router> {
    Ok(router(test_state(secret, None).await?))
}
