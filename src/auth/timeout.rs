use std::{future::Future, time::Duration};

use super::error::AuthError;

/// Bounds an external call; `what` names it in the resulting error.
pub async fn with_timeout<T, E, F>(limit: Duration, what: &'static str, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, E>>,
    AuthError: From<E>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AuthError::from),
        Err(_) => {
            tracing::warn!(call = what, timeout_ms = limit.as_millis() as u64, "external call timed out");
            Err(AuthError::Timeout(what))
        }
    }
}
