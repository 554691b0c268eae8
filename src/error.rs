use axum::http::StatusCode;

use crate::auth::AuthError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps a bare status produced outside our handlers, e.g. an extractor rejection.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::CONFLICT => Self::Conflict(message),
            StatusCode::SERVICE_UNAVAILABLE => Self::Unavailable(message),
            status if status.is_client_error() => Self::BadRequest(message),
            _ => Self::Internal(message),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::Unavailable(message)
            | Self::Internal(message) => message.as_str(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

// Credential and token failures all read "unauthorized" to the client; the
// real cause only goes to the log.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_unauthorized() {
            tracing::warn!(error = %err, "request rejected as unauthorized");
            return AppError::unauthorized("unauthorized");
        }

        match err {
            AuthError::Conflict(_) => AppError::conflict(err.to_string()),
            AuthError::NotFound(_) => AppError::not_found(err.to_string()),
            AuthError::Validation(message) => AppError::bad_request(message),
            AuthError::Forbidden(_) => AppError::forbidden(err.to_string()),
            AuthError::Timeout(_) | AuthError::UpstreamUnavailable(_) => {
                tracing::warn!(error = %err, "dependency unavailable");
                AppError::unavailable("service temporarily unavailable")
            }
            _ => {
                tracing::error!(error = %err, "internal auth failure");
                AppError::internal("internal server error")
            }
        }
    }
}
