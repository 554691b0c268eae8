use thiserror::Error;

use crate::db::dao::DaoLayerError;

/// Failure kinds produced by the auth core.
///
/// Credential and token variants carry enough detail for operators; the HTTP
/// boundary collapses them into a generic "unauthorized" before anything
/// reaches a client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("access token expired")]
    ExpiredToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("token has no exp claim")]
    MissingExpiryClaim,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("refresh token invalid or expired")]
    RefreshTokenInvalid,
    #[error("refresh session does not belong to the token subject")]
    SessionMismatch,
    #[error("{0} not found")]
    NotFound(String),
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("missing permission: {0}")]
    Forbidden(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Failures that may succeed when the same call is repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::UpstreamUnavailable(_) | Self::Storage(_)
        )
    }

    /// Credential and token failures that must only ever surface as "unauthorized".
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::ExpiredToken
                | Self::InvalidSignature
                | Self::MalformedToken(_)
                | Self::MissingExpiryClaim
                | Self::RefreshTokenInvalid
                | Self::SessionMismatch
                | Self::ExchangeFailed(_)
        )
    }
}

impl From<DaoLayerError> for AuthError {
    fn from(err: DaoLayerError) -> Self {
        match err {
            DaoLayerError::NotFound { entity, id } => {
                AuthError::NotFound(format!("{entity} {id}"))
            }
            DaoLayerError::Conflict { entity, detail } => {
                AuthError::Conflict(format!("{entity}: {detail}"))
            }
            DaoLayerError::Db(_) | DaoLayerError::Unavailable(_) => {
                AuthError::Storage(err.to_string())
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat => AuthError::InvalidSignature,
            ErrorKind::MissingRequiredClaim(claim) if claim == "exp" => {
                AuthError::MissingExpiryClaim
            }
            ErrorKind::ImmatureSignature => {
                AuthError::MalformedToken("token is not valid yet".to_string())
            }
            _ => AuthError::MalformedToken(err.to_string()),
        }
    }
}
