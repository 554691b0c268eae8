use sea_orm::{DbErr, SqlErr};
use std::fmt;
use uuid::Uuid;

#[derive(Debug)]
pub enum DaoLayerError {
    Db(DbErr),
    NotFound { entity: &'static str, id: Uuid },
    Conflict { entity: &'static str, detail: String },
    Unavailable(String),
}

pub type DaoResult<T> = Result<T, DaoLayerError>;

impl DaoLayerError {
    /// Wraps a driver error, turning unique-index violations into `Conflict`.
    pub fn from_db(entity: &'static str, err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                DaoLayerError::Conflict { entity, detail }
            }
            _ => DaoLayerError::Db(err),
        }
    }

    pub fn conflict(entity: &'static str, detail: impl Into<String>) -> Self {
        DaoLayerError::Conflict {
            entity,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for DaoLayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoLayerError::Db(err) => write!(f, "Database error: {err}"),
            DaoLayerError::NotFound { entity, id } => {
                write!(f, "{entity} not found (id={id})")
            }
            DaoLayerError::Conflict { entity, detail } => {
                write!(f, "{entity} conflict: {detail}")
            }
            DaoLayerError::Unavailable(reason) => write!(f, "Store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for DaoLayerError {}
