use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use super::{DaoLayerError, DaoResult};
use crate::auth::session_store::SessionStore;
use crate::auth::types::RefreshSession;
use crate::db::entities::{prelude::RefreshSession as RefreshSessionEntity, refresh_session};

const ENTITY_NAME: &str = "refresh_session";

/// Database-backed session store; one row per live refresh token.
#[derive(Clone)]
pub struct RefreshSessionDao {
    db: DatabaseConnection,
}

impl RefreshSessionDao {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }
}

fn into_session(model: refresh_session::Model) -> RefreshSession {
    RefreshSession {
        user_id: model.user_id,
        email: model.email,
        role_id: model.role_id,
        provider: model.provider,
        session_id: model.session_id,
        mfa_completed: model.mfa_completed,
        expires_at: model.expires_at.with_timezone(&Utc),
    }
}

#[async_trait]
impl SessionStore for RefreshSessionDao {
    async fn put(&self, token: &str, session: RefreshSession) -> DaoResult<()> {
        let active = refresh_session::ActiveModel {
            token: Set(token.to_string()),
            user_id: Set(session.user_id),
            email: Set(session.email),
            role_id: Set(session.role_id),
            provider: Set(session.provider),
            session_id: Set(session.session_id),
            mfa_completed: Set(session.mfa_completed),
            expires_at: Set(session.expires_at.fixed_offset()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        RefreshSessionEntity::insert(active)
            .on_conflict(
                OnConflict::column(refresh_session::Column::Token)
                    .update_columns([
                        refresh_session::Column::UserId,
                        refresh_session::Column::Email,
                        refresh_session::Column::RoleId,
                        refresh_session::Column::Provider,
                        refresh_session::Column::SessionId,
                        refresh_session::Column::MfaCompleted,
                        refresh_session::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|err| DaoLayerError::from_db(ENTITY_NAME, err))?;
        Ok(())
    }

    async fn get(&self, token: &str) -> DaoResult<Option<RefreshSession>> {
        let Some(model) = RefreshSessionEntity::find_by_id(token.to_string())
            .one(&self.db)
            .await
            .map_err(DaoLayerError::Db)?
        else {
            return Ok(None);
        };

        let now = Utc::now();
        if model.expires_at.with_timezone(&Utc) <= now {
            // Only drop the row if it is still the expired one.
            RefreshSessionEntity::delete_many()
                .filter(refresh_session::Column::Token.eq(token))
                .filter(refresh_session::Column::ExpiresAt.lte(now.fixed_offset()))
                .exec(&self.db)
                .await
                .map_err(DaoLayerError::Db)?;
            return Ok(None);
        }

        Ok(Some(into_session(model)))
    }

    async fn take(&self, token: &str) -> DaoResult<Option<RefreshSession>> {
        let Some(session) = self.get(token).await? else {
            return Ok(None);
        };

        // The row is read first; only the caller whose delete removes it wins.
        let result = RefreshSessionEntity::delete_many()
            .filter(refresh_session::Column::Token.eq(token))
            .filter(refresh_session::Column::ExpiresAt.gt(Utc::now().fixed_offset()))
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;

        Ok((result.rows_affected == 1).then_some(session))
    }

    async fn delete(&self, token: &str) -> DaoResult<()> {
        RefreshSessionEntity::delete_by_id(token.to_string())
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(())
    }

    async fn purge_expired(&self) -> DaoResult<usize> {
        let result = RefreshSessionEntity::delete_many()
            .filter(refresh_session::Column::ExpiresAt.lte(Utc::now().fixed_offset()))
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected as usize)
    }
}
