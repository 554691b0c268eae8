use std::sync::Arc;

use crate::{
    auth::{AuthServices, OAuthLinker, RbacResolver, SessionManager},
    config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionManager,
    pub rbac: RbacResolver,
    pub oauth: Option<OAuthLinker>,
}

impl AppState {
    pub fn new(config: AppConfig, services: AuthServices) -> Arc<Self> {
        Arc::new(Self {
            config,
            sessions: services.sessions,
            rbac: services.rbac,
            oauth: services.oauth,
        })
    }
}
