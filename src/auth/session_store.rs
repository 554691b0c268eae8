use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::types::RefreshSession;
use crate::db::dao::{DaoLayerError, DaoResult};

/// Refresh sessions keyed by their opaque token.
///
/// Every call is atomic on its own. `get` and `take` never return an expired
/// record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, token: &str, session: RefreshSession) -> DaoResult<()>;
    async fn get(&self, token: &str) -> DaoResult<Option<RefreshSession>>;
    /// Removes and returns a live session. Of several concurrent takes of one
    /// token, at most one gets `Some`.
    async fn take(&self, token: &str) -> DaoResult<Option<RefreshSession>>;
    /// Deleting a missing token is not an error.
    async fn delete(&self, token: &str) -> DaoResult<()>;
    /// Removes every expired record and returns how many were dropped.
    async fn purge_expired(&self) -> DaoResult<usize>;
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, RefreshSession>>>,
}

fn poisoned<T>(_: T) -> DaoLayerError {
    DaoLayerError::Unavailable("session store lock poisoned".to_string())
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> DaoResult<usize> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> DaoResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, token: &str, session: RefreshSession) -> DaoResult<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(token.to_string(), session);
        Ok(())
    }

    async fn get(&self, token: &str) -> DaoResult<Option<RefreshSession>> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().map_err(poisoned)?;
            match sessions.get(token) {
                None => return Ok(None),
                Some(session) if !session.is_expired_at(now) => return Ok(Some(session.clone())),
                Some(_) => {}
            }
        }

        // Another task may have re-put the token between the two locks.
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        match sessions.get(token) {
            Some(session) if session.is_expired_at(now) => {
                sessions.remove(token);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn take(&self, token: &str) -> DaoResult<Option<RefreshSession>> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        Ok(sessions
            .remove(token)
            .filter(|session| !session.is_expired_at(now)))
    }

    async fn delete(&self, token: &str) -> DaoResult<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(token);
        Ok(())
    }

    async fn purge_expired(&self) -> DaoResult<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok(before - sessions.len())
    }
}
