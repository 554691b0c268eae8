//! Service wiring and first-run seeding.

use std::sync::Arc;

use anyhow::{Context, Result};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use super::jwt::TokenService;
use super::oauth::{IdentityProvider, OAuthLinker, OidcIdentityProvider};
use super::password::hash_password;
use super::rbac::RbacResolver;
use super::session::{SessionManager, SessionSettings};
use super::session_store::{MemorySessionStore, SessionStore};
use crate::config::{AppConfig, AuthConfig, OAuthConfig, SessionStoreKind, defaults};
use crate::db::dao::DaoContext;
use crate::db::directory::{NewUser, OAuthCredentialStore, RbacStore, UserDirectory};
use crate::db::memory::MemoryDirectory;

/// Storage implementations behind every auth service.
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserDirectory>,
    pub rbac: Arc<dyn RbacStore>,
    pub credentials: Arc<dyn OAuthCredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Backends {
    pub fn in_memory() -> Self {
        let directory = Arc::new(MemoryDirectory::new());
        Self {
            users: directory.clone(),
            rbac: directory.clone(),
            credentials: directory,
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }

    pub fn database(db: &DatabaseConnection, session_store: SessionStoreKind) -> Self {
        let ctx = DaoContext::new(db);
        let sessions: Arc<dyn SessionStore> = match session_store {
            SessionStoreKind::Database => Arc::new(ctx.refresh_session()),
            SessionStoreKind::Memory => Arc::new(MemorySessionStore::new()),
        };
        Self {
            users: Arc::new(ctx.user()),
            rbac: Arc::new(ctx.rbac()),
            credentials: Arc::new(ctx.oauth_provider()),
            sessions,
        }
    }
}

#[derive(Clone)]
pub struct AuthServices {
    pub sessions: SessionManager,
    pub rbac: RbacResolver,
    pub oauth: Option<OAuthLinker>,
    pub session_store: Arc<dyn SessionStore>,
}

impl AuthServices {
    /// Builds the services, talking to the configured OIDC provider when an
    /// `oauth` section is present.
    pub fn build(auth: &AuthConfig, oauth: Option<&OAuthConfig>, backends: Backends) -> Result<Self> {
        let provider = match oauth {
            Some(cfg) => {
                let provider = OidcIdentityProvider::new(cfg.clone(), auth.io_timeout())
                    .context("failed to build oauth http client")?;
                Some(Arc::new(provider) as Arc<dyn IdentityProvider>)
            }
            None => None,
        };
        Ok(Self::assemble(auth, provider, backends))
    }

    pub fn assemble(
        auth: &AuthConfig,
        provider: Option<Arc<dyn IdentityProvider>>,
        backends: Backends,
    ) -> Self {
        let rbac = RbacResolver::new(backends.rbac.clone(), auth.io_timeout());
        let sessions = SessionManager::new(
            backends.users.clone(),
            backends.sessions.clone(),
            rbac.clone(),
            TokenService::new(&auth.jwt_secret, auth.access_ttl()),
            SessionSettings {
                access_ttl: auth.access_ttl(),
                refresh_ttl: auth.refresh_ttl(),
                io_timeout: auth.io_timeout(),
                default_role: auth.default_role.clone(),
            },
        );
        let oauth = provider.map(|provider| {
            OAuthLinker::new(
                provider,
                backends.users.clone(),
                backends.credentials.clone(),
                sessions.clone(),
                auth.io_timeout(),
            )
        });

        Self {
            sessions,
            rbac,
            oauth,
            session_store: backends.sessions,
        }
    }
}

/// Chooses backends from config, seeds them and builds the services.
pub async fn init(cfg: &AppConfig, db: Option<&DatabaseConnection>) -> Result<AuthServices> {
    let auth = cfg.auth.as_ref().context("missing [auth] configuration")?;
    let backends = match db {
        Some(db) => Backends::database(db, auth.session_store),
        None => {
            tracing::warn!("no database configured, auth state lives in memory");
            Backends::in_memory()
        }
    };

    seed(auth, &backends).await?;
    AuthServices::build(auth, cfg.oauth.as_ref(), backends)
}

/// Ensures the baseline roles, the admin grant and the admin user exist.
pub async fn seed(auth: &AuthConfig, backends: &Backends) -> Result<()> {
    let rbac = backends.rbac.as_ref();
    let admin_role = ensure_role(rbac, defaults::ADMIN_ROLE).await?;
    ensure_role(rbac, &auth.default_role).await?;

    let manage = match rbac
        .find_permission_by_name(defaults::RBAC_MANAGE_PERMISSION)
        .await?
    {
        Some(existing) => existing,
        None => rbac
            .create_permission(defaults::RBAC_MANAGE_PERMISSION)
            .await
            .context("failed to seed rbac permission")?,
    };
    if rbac.find_grant(admin_role, manage.id).await?.is_none() {
        rbac.create_role_permission(admin_role, manage.id)
            .await
            .context("failed to grant rbac permission to admin")?;
    }

    seed_admin(auth, backends.users.as_ref(), admin_role).await
}

async fn ensure_role(rbac: &dyn RbacStore, name: &str) -> Result<Uuid> {
    if let Some(existing) = rbac.find_role_by_name(name).await? {
        return Ok(existing.id);
    }
    let created = rbac
        .create_role(name)
        .await
        .with_context(|| format!("failed to seed role `{name}`"))?;
    tracing::info!(role = %created.name, "seeded role");
    Ok(created.id)
}

async fn seed_admin(auth: &AuthConfig, users: &dyn UserDirectory, admin_role: Uuid) -> Result<()> {
    if let Some(existing) = users.find_by_email(&auth.admin_email).await? {
        if existing.role_id.is_none() {
            let mut promoted = existing;
            promoted.role_id = Some(admin_role);
            users.update(promoted).await?;
            tracing::info!(email = %auth.admin_email, "assigned admin role to existing user");
        } else {
            tracing::info!(email = %existing.email, "admin user already present");
        }
        return Ok(());
    }

    let password_hash = hash_password(&auth.admin_password).context("admin seed hash error")?;
    let user = users
        .create(NewUser {
            email: auth.admin_email.clone(),
            password_hash: Some(password_hash),
            full_name: "Administrator".to_string(),
            avatar_path: None,
            email_verified: true,
            role_id: Some(admin_role),
        })
        .await
        .context("failed to seed admin user")?;
    tracing::info!(user_id = %user.id, "seeded admin user");
    Ok(())
}
