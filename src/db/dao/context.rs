use sea_orm::DatabaseConnection;

use super::{DaoBase, OAuthProviderDao, RbacDao, RefreshSessionDao, UserDao};

#[derive(Clone)]
pub struct DaoContext {
    db: DatabaseConnection,
}

impl DaoContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    pub fn user(&self) -> UserDao {
        DaoBase::new(&self.db)
    }

    pub fn rbac(&self) -> RbacDao {
        RbacDao::new(&self.db)
    }

    pub fn oauth_provider(&self) -> OAuthProviderDao {
        DaoBase::new(&self.db)
    }

    pub fn refresh_session(&self) -> RefreshSessionDao {
        RefreshSessionDao::new(&self.db)
    }
}
