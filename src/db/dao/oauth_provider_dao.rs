use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, QueryFilter, Set, TransactionTrait};
use uuid::Uuid;

use super::user_dao::new_user_model;
use super::{DaoBase, DaoLayerError, DaoResult, HasIdActiveModel, TimestampedActiveModel, UserDao};
use crate::db::directory::{NewOAuthCredential, NewUser, OAuthCredentialStore};
use crate::db::entities::{oauth_provider, prelude::OAuthProvider, user};

#[derive(Clone)]
pub struct OAuthProviderDao {
    db: DatabaseConnection,
}

impl DaoBase for OAuthProviderDao {
    type Entity = OAuthProvider;
    const ENTITY_NAME: &'static str = "oauth_provider";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl OAuthProviderDao {
    async fn overwrite(
        &self,
        id: Uuid,
        credential: NewOAuthCredential,
    ) -> DaoResult<oauth_provider::Model> {
        DaoBase::update(self, id, move |active| {
            active.provider_id = Set(credential.provider_id);
            active.access_token = Set(credential.access_token);
            active.refresh_token = Set(credential.refresh_token);
            active.expires_at = Set(credential.expires_at);
        })
        .await
    }
}

fn credential_model(user_id: Uuid, credential: NewOAuthCredential) -> oauth_provider::ActiveModel {
    oauth_provider::ActiveModel {
        user_id: Set(user_id),
        provider: Set(credential.provider),
        provider_id: Set(credential.provider_id),
        access_token: Set(credential.access_token),
        refresh_token: Set(credential.refresh_token),
        expires_at: Set(credential.expires_at),
        ..Default::default()
    }
}

#[async_trait]
impl OAuthCredentialStore for OAuthProviderDao {
    async fn find(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> DaoResult<Option<oauth_provider::Model>> {
        let provider = provider.to_string();
        self.find_one(move |query| {
            query
                .filter(oauth_provider::Column::UserId.eq(user_id))
                .filter(oauth_provider::Column::Provider.eq(provider))
        })
        .await
    }

    async fn create(
        &self,
        user_id: Uuid,
        credential: NewOAuthCredential,
    ) -> DaoResult<oauth_provider::Model> {
        if let Some(existing) = OAuthCredentialStore::find(self, user_id, &credential.provider).await? {
            return self.overwrite(existing.id, credential).await;
        }
        match DaoBase::create(self, credential_model(user_id, credential.clone())).await {
            // A concurrent link inserted the pair after our lookup.
            Err(DaoLayerError::Conflict { .. }) => {
                let existing = OAuthCredentialStore::find(self, user_id, &credential.provider)
                    .await?
                    .ok_or_else(|| {
                        DaoLayerError::conflict(Self::ENTITY_NAME, "credential vanished during upsert")
                    })?;
                self.overwrite(existing.id, credential).await
            }
            other => other,
        }
    }

    async fn update(
        &self,
        credential: oauth_provider::Model,
    ) -> DaoResult<oauth_provider::Model> {
        let id = credential.id;
        self.overwrite(
            id,
            NewOAuthCredential {
                provider: credential.provider,
                provider_id: credential.provider_id,
                access_token: credential.access_token,
                refresh_token: credential.refresh_token,
                expires_at: credential.expires_at,
            },
        )
        .await
    }

    async fn create_user_with_credential(
        &self,
        new_user: NewUser,
        credential: NewOAuthCredential,
    ) -> DaoResult<(user::Model, oauth_provider::Model)> {
        let txn = self.db.begin().await.map_err(DaoLayerError::Db)?;
        let now = Utc::now().fixed_offset();

        let mut user_active = new_user_model(new_user);
        user_active.set_id(Uuid::new_v4());
        user_active.set_created_at(now);
        user_active.set_updated_at(now);
        let created_user = user_active
            .insert(&txn)
            .await
            .map_err(|err| DaoLayerError::from_db(UserDao::ENTITY_NAME, err))?;

        let mut credential_active = credential_model(created_user.id, credential);
        credential_active.set_id(Uuid::new_v4());
        credential_active.set_created_at(now);
        credential_active.set_updated_at(now);
        let created_credential = credential_active
            .insert(&txn)
            .await
            .map_err(|err| DaoLayerError::from_db(Self::ENTITY_NAME, err))?;

        txn.commit().await.map_err(DaoLayerError::Db)?;
        Ok((created_user, created_credential))
    }
}
