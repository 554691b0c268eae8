use futures_util::future::join_all;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, Set};
use uuid::Uuid;

use auth_core::{
    config::DatabaseConfig,
    db::{
        NewOAuthCredential, NewUser, OAuthCredentialStore, RbacStore, UserDirectory,
        connection::connect,
        dao::{DaoBase, DaoLayerError, OAuthProviderDao, RbacDao, UserDao, rbac_dao::RolePermissionDao},
        entities::{oauth_provider, role_permission},
    },
};

async fn database() -> DatabaseConnection {
    // One connection so every statement sees the same in-memory database.
    connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_idle: 1,
    })
    .await
    .expect("sqlite schema sync")
}

async fn user(db: &DatabaseConnection) -> Uuid {
    let dao: UserDao = DaoBase::new(db);
    UserDirectory::create(
        &dao,
        NewUser {
            email: format!("{}@x.com", Uuid::new_v4()),
            password_hash: None,
            full_name: "Linked".to_string(),
            avatar_path: None,
            email_verified: true,
            role_id: None,
        },
    )
    .await
    .expect("user")
    .id
}

fn credential(access_token: &str) -> NewOAuthCredential {
    NewOAuthCredential {
        provider: "google".to_string(),
        provider_id: "g-1".to_string(),
        access_token: access_token.to_string(),
        refresh_token: None,
        expires_at: None,
    }
}

#[tokio::test]
async fn duplicate_credential_insert_is_a_conflict() {
    let db = database().await;
    let user_id = user(&db).await;
    let dao: OAuthProviderDao = DaoBase::new(&db);

    let row = || oauth_provider::ActiveModel {
        user_id: Set(user_id),
        provider: Set("google".to_string()),
        provider_id: Set("g-1".to_string()),
        access_token: Set("token".to_string()),
        refresh_token: Set(None),
        expires_at: Set(None),
        ..Default::default()
    };
    DaoBase::create(&dao, row()).await.expect("first insert");
    let err = DaoBase::create(&dao, row())
        .await
        .expect_err("second insert should hit the unique index");
    assert!(matches!(err, DaoLayerError::Conflict { .. }), "{err:?}");
}

#[tokio::test]
async fn concurrent_links_leave_one_credential() {
    let db = database().await;
    let user_id = user(&db).await;
    let dao: OAuthProviderDao = DaoBase::new(&db);

    let links = (0..8).map(|i| {
        let dao = dao.clone();
        tokio::spawn(async move {
            OAuthCredentialStore::create(&dao, user_id, credential(&format!("token-{i}"))).await
        })
    });
    for result in join_all(links).await {
        result.expect("task").expect("every link should land");
    }

    let rows = dao
        .find_all(move |query| query.filter(oauth_provider::Column::UserId.eq(user_id)))
        .await
        .expect("list");
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn duplicate_grant_insert_is_a_conflict() {
    let db = database().await;
    let rbac = RbacDao::new(&db);
    let role = rbac.create_role("editor").await.expect("role");
    let permission = rbac.create_permission("doc:write").await.expect("permission");

    let grants: RolePermissionDao = DaoBase::new(&db);
    let row = || role_permission::ActiveModel {
        role_id: Set(role.id),
        permission_id: Set(permission.id),
        ..Default::default()
    };
    grants.create(row()).await.expect("first grant");
    let err = grants
        .create(row())
        .await
        .expect_err("second grant should hit the unique index");
    assert!(matches!(err, DaoLayerError::Conflict { .. }), "{err:?}");
}

#[tokio::test]
async fn concurrent_grants_store_one_row() {
    let db = database().await;
    let rbac = RbacDao::new(&db);
    let role = rbac.create_role("reviewer").await.expect("role");
    let permission = rbac.create_permission("doc:review").await.expect("permission");

    let (role_id, permission_id) = (role.id, permission.id);
    let attempts = (0..8).map(|_| {
        let rbac = rbac.clone();
        tokio::spawn(async move { rbac.create_role_permission(role_id, permission_id).await })
    });
    let mut created = 0;
    for result in join_all(attempts).await {
        match result.expect("task") {
            Ok(_) => created += 1,
            Err(DaoLayerError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(rbac.list_role_permissions().await.expect("list").len(), 1);
}
