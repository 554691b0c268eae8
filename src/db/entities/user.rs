use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(default_expr = "Expr::current_timestamp()")]
    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(default_expr = "Expr::current_timestamp()")]
    pub updated_at: DateTimeWithTimeZone,
    #[sea_orm(unique)]
    pub email: String,
    /// Absent for accounts that only ever signed in through an OAuth provider.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub full_name: String,
    pub avatar_path: Option<String>,
    #[sea_orm(default_value = false)]
    pub email_verified: bool,
    #[sea_orm(default_value = false)]
    pub mfa_enabled: bool,
    #[serde(skip_serializing)]
    pub mfa_secret: Option<String>,
    #[sea_orm(indexed)]
    pub role_id: Option<Uuid>,
    #[sea_orm(indexed)]
    pub deleted_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(has_many)]
    pub oauth_providers: HasMany<super::oauth_provider::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
