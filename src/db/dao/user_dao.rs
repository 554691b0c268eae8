use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, Set};
use uuid::Uuid;

use super::{DaoBase, DaoResult};
use crate::db::directory::{NewUser, UserDirectory};
use crate::db::entities::{prelude::User, user};

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl DaoBase for UserDao {
    type Entity = User;
    const ENTITY_NAME: &'static str = "user";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub(crate) fn new_user_model(new: NewUser) -> user::ActiveModel {
    user::ActiveModel {
        email: Set(new.email),
        password_hash: Set(new.password_hash),
        full_name: Set(new.full_name),
        avatar_path: Set(new.avatar_path),
        email_verified: Set(new.email_verified),
        mfa_enabled: Set(false),
        mfa_secret: Set(None),
        role_id: Set(new.role_id),
        deleted_at: Set(None),
        ..Default::default()
    }
}

impl UserDao {
    pub async fn find_live_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        let email = email.to_string();
        self.find_one(move |query| {
            query
                .filter(user::Column::Email.eq(email))
                .filter(user::Column::DeletedAt.is_null())
        })
        .await
    }

    pub async fn find_live_by_id(&self, id: Uuid) -> DaoResult<Option<user::Model>> {
        self.find_one(move |query| {
            query
                .filter(user::Column::Id.eq(id))
                .filter(user::Column::DeletedAt.is_null())
        })
        .await
    }
}

#[async_trait]
impl UserDirectory for UserDao {
    async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        self.find_live_by_email(email).await
    }

    async fn find_by_id(&self, id: Uuid) -> DaoResult<Option<user::Model>> {
        self.find_live_by_id(id).await
    }

    async fn create(&self, new: NewUser) -> DaoResult<user::Model> {
        DaoBase::create(self, new_user_model(new)).await
    }

    async fn update(&self, changed: user::Model) -> DaoResult<user::Model> {
        DaoBase::update(self, changed.id, move |active| {
            active.email = Set(changed.email);
            active.password_hash = Set(changed.password_hash);
            active.full_name = Set(changed.full_name);
            active.avatar_path = Set(changed.avatar_path);
            active.email_verified = Set(changed.email_verified);
            active.mfa_enabled = Set(changed.mfa_enabled);
            active.mfa_secret = Set(changed.mfa_secret);
            active.role_id = Set(changed.role_id);
        })
        .await
    }

    async fn email_exists(&self, email: &str) -> DaoResult<bool> {
        Ok(self.find_live_by_email(email).await?.is_some())
    }

    async fn soft_delete(&self, id: Uuid) -> DaoResult<()> {
        let now = Utc::now().fixed_offset();
        DaoBase::update(self, id, move |active| {
            active.deleted_at = Set(Some(now));
        })
        .await
        .map(|_| ())
    }
}
