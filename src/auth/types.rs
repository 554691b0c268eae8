use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LOCAL_PROVIDER: &str = "local";
pub const TOKEN_TYPE: &str = "Bearer";

/// Provider tag recorded on sessions opened through an external identity provider.
pub fn oauth_provider_tag(provider: &str) -> String {
    format!("oauth:{provider}")
}

/// Snapshot of who the caller is, embedded verbatim in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "sub")]
    pub user_id: Uuid,
    pub email: String,
    /// Role name; empty when the user has no role.
    pub role: String,
    /// Sorted, without duplicates.
    pub permissions: Vec<String>,
    pub provider: String,
    #[serde(rename = "sid")]
    pub session_id: String,
    #[serde(rename = "mfa")]
    pub mfa_completed: bool,
}

impl Identity {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .binary_search_by(|held| held.as_str().cmp(permission))
            .is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: Identity,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in,
        }
    }
}

/// Server-side record behind one refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSession {
    pub user_id: Uuid,
    pub email: String,
    pub role_id: Option<Uuid>,
    pub provider: String,
    pub session_id: String,
    pub mfa_completed: bool,
    pub expires_at: DateTime<Utc>,
}

impl RefreshSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
