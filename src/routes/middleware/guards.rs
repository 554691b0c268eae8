use std::{marker::PhantomData, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use crate::{
    auth::{AuthError, Claims, Identity},
    config::defaults,
    error::AppError,
    state::AppState,
};

/// Verified access-token claims for the current request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
}

impl AuthContext {
    pub fn identity(&self) -> &Identity {
        &self.claims.identity
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::from(AuthError::MalformedToken("missing bearer token".into())))
}

impl FromRequestParts<Arc<AppState>> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>().cloned() {
            return Ok(ctx);
        }

        let token = bearer_token(&parts.headers)?;
        let claims = state.sessions.tokens().verify(token)?;

        let ctx = AuthContext { claims };
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

pub trait RequiredPermission: Send + Sync + 'static {
    const PERMISSION: &'static str;
}

pub struct RbacManage;

impl RequiredPermission for RbacManage {
    const PERMISSION: &'static str = defaults::RBAC_MANAGE_PERMISSION;
}

/// Rejects callers whose claims lack `P::PERMISSION`.
pub struct RequirePermission<P: RequiredPermission> {
    pub ctx: AuthContext,
    _marker: PhantomData<P>,
}

impl<P> FromRequestParts<Arc<AppState>> for RequirePermission<P>
where
    P: RequiredPermission,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ctx = AuthContext::from_request_parts(parts, state).await?;
        state.rbac.authorize(ctx.identity(), P::PERMISSION)?;

        Ok(Self {
            ctx,
            _marker: PhantomData,
        })
    }
}
