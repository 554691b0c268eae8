use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::error::AuthError;
use super::jwt::TokenService;
use super::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use super::random::opaque_token;
use super::rbac::{RbacResolver, RoleSnapshot};
use super::session_store::SessionStore;
use super::timeout::with_timeout;
use super::types::{Claims, Identity, LOCAL_PROVIDER, RefreshSession, TokenPair};
use crate::db::directory::{NewUser, UserDirectory};
use crate::db::entities::user;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub avatar_path: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub io_timeout: Duration,
    /// Role assigned at registration, when it exists.
    pub default_role: String,
}

/// Login, refresh-token rotation and logout over an injected session store.
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    rbac: RbacResolver,
    tokens: TokenService,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        rbac: RbacResolver,
        tokens: TokenService,
        settings: SessionSettings,
    ) -> Self {
        Self {
            users,
            sessions,
            rbac,
            tokens,
            settings,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn rbac(&self) -> &RbacResolver {
        &self.rbac
    }

    pub async fn register(&self, input: RegisterInput) -> Result<user::Model, AuthError> {
        let email = input.email.trim().to_string();
        if email.is_empty() {
            return Err(AuthError::validation("email must not be empty"));
        }
        if input.password != input.confirm_password {
            return Err(AuthError::validation("passwords do not match"));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let timeout = self.settings.io_timeout;
        if with_timeout(timeout, "email lookup", self.users.email_exists(&email)).await? {
            return Err(AuthError::Conflict(format!("email `{email}` already registered")));
        }

        let role_id = self
            .rbac
            .role_by_name(&self.settings.default_role)
            .await?
            .map(|role| role.id);

        let password_hash = hash_password(&input.password)?;
        let created = with_timeout(
            timeout,
            "user create",
            self.users.create(NewUser {
                email,
                password_hash: Some(password_hash),
                full_name: input.full_name.trim().to_string(),
                avatar_path: input.avatar_path,
                email_verified: false,
                role_id,
            }),
        )
        .await?;

        tracing::info!(user_id = %created.id, "user registered");
        Ok(created)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let email = email.trim();
        let user = with_timeout(
            self.settings.io_timeout,
            "user lookup",
            self.users.find_by_email(email),
        )
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        let Some(hash) = user.password_hash.as_deref() else {
            tracing::debug!(user_id = %user.id, "password login attempted on oauth-only account");
            return Err(AuthError::InvalidCredentials);
        };

        match verify_password(password, hash) {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::InvalidCredentials),
            Err(err) => {
                tracing::error!(user_id = %user.id, error = %err, "stored password hash is unreadable");
                return Err(AuthError::InvalidCredentials);
            }
        }

        self.issue_for_user(&user, LOCAL_PROVIDER).await
    }

    /// Opens a fresh session for an already authenticated user.
    pub async fn issue_for_user(
        &self,
        user: &user::Model,
        provider: &str,
    ) -> Result<TokenPair, AuthError> {
        let snapshot = self.rbac.snapshot_for(user.role_id).await?;
        if user.mfa_enabled {
            tracing::debug!(user_id = %user.id, "mfa enabled but not yet verified for this session");
        }

        let identity = identity_from(
            user.id,
            &user.email,
            &snapshot,
            provider,
            Uuid::new_v4().to_string(),
            false,
        );
        let pair = self.mint(identity, snapshot.role_id).await?;
        tracing::info!(user_id = %user.id, provider, "session issued");
        Ok(pair)
    }

    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let claims: Claims = self.tokens.parse_ignoring_expiry(access_token)?;

        // Consumed before anything is minted; the presented token is spent
        // even when the checks below reject it.
        let session = with_timeout(
            self.settings.io_timeout,
            "session take",
            self.sessions.take(refresh_token),
        )
        .await?
        .ok_or(AuthError::RefreshTokenInvalid)?;

        if session.user_id != claims.identity.user_id {
            tracing::warn!(
                session_user = %session.user_id,
                token_user = %claims.identity.user_id,
                "refresh token presented with another user's access token"
            );
            return Err(AuthError::SessionMismatch);
        }

        let snapshot = self.rbac.snapshot_for(session.role_id).await?;
        let identity = identity_from(
            session.user_id,
            &session.email,
            &snapshot,
            &session.provider,
            session.session_id.clone(),
            session.mfa_completed,
        );
        let pair = self.mint(identity, snapshot.role_id).await?;

        tracing::info!(user_id = %session.user_id, session_id = %session.session_id, "refresh token rotated");
        Ok(pair)
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        with_timeout(
            self.settings.io_timeout,
            "session delete",
            self.sessions.delete(refresh_token),
        )
        .await
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<user::Model, AuthError> {
        with_timeout(
            self.settings.io_timeout,
            "user lookup",
            self.users.find_by_id(user_id),
        )
        .await?
        .ok_or_else(|| AuthError::not_found(format!("user {user_id}")))
    }

    async fn mint(
        &self,
        identity: Identity,
        role_id: Option<Uuid>,
    ) -> Result<TokenPair, AuthError> {
        let access_token = self.tokens.issue(&identity, Some(self.settings.access_ttl))?;
        let refresh_token = opaque_token();

        let refresh_ttl = chrono::Duration::from_std(self.settings.refresh_ttl)
            .map_err(|err| AuthError::Signing(format!("refresh ttl out of range: {err}")))?;
        let session = RefreshSession {
            user_id: identity.user_id,
            email: identity.email.clone(),
            role_id,
            provider: identity.provider.clone(),
            session_id: identity.session_id.clone(),
            mfa_completed: identity.mfa_completed,
            expires_at: Utc::now() + refresh_ttl,
        };
        with_timeout(
            self.settings.io_timeout,
            "session store",
            self.sessions.put(&refresh_token, session),
        )
        .await?;

        Ok(TokenPair::bearer(
            access_token,
            refresh_token,
            self.settings.access_ttl.as_secs(),
        ))
    }
}

fn identity_from(
    user_id: Uuid,
    email: &str,
    snapshot: &RoleSnapshot,
    provider: &str,
    session_id: String,
    mfa_completed: bool,
) -> Identity {
    Identity {
        user_id,
        email: email.to_string(),
        role: snapshot.name.clone(),
        permissions: snapshot.permission_list(),
        provider: provider.to_string(),
        session_id,
        mfa_completed,
    }
}
