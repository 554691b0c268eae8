//! OAuth account linking.
//!
//! A callback walks `Exchanged -> Reconciled -> TokensIssued`. Any failure on
//! the way aborts the callback before a session exists.

pub mod provider;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::error::AuthError;
use super::random::opaque_token;
use super::session::SessionManager;
use super::timeout::with_timeout;
use super::types::{TokenPair, oauth_provider_tag};
use crate::db::directory::{NewOAuthCredential, NewUser, OAuthCredentialStore, UserDirectory};
use crate::db::entities::user;

pub use provider::{IdentityProvider, OidcIdentityProvider, ProviderProfile, ProviderTokens};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Which reconcile branch a callback took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    CreatedUser,
    LinkedExistingUser,
    RefreshedCredential,
}

/// Rejects a callback whose `state` does not match what the client was issued.
pub fn verify_state(expected: &str, returned: &str) -> Result<(), AuthError> {
    if expected.is_empty()
        || returned.is_empty()
        || !constant_time_eq(expected.as_bytes(), returned.as_bytes())
    {
        return Err(AuthError::validation("invalid state"));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Clone)]
pub struct OAuthLinker {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserDirectory>,
    credentials: Arc<dyn OAuthCredentialStore>,
    sessions: SessionManager,
    io_timeout: Duration,
}

impl OAuthLinker {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserDirectory>,
        credentials: Arc<dyn OAuthCredentialStore>,
        sessions: SessionManager,
        io_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            users,
            credentials,
            sessions,
            io_timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn authorization_request(&self) -> Result<AuthorizationRequest, AuthError> {
        let state = opaque_token();
        let url = self.provider.authorization_url(&state)?;
        Ok(AuthorizationRequest { url, state })
    }

    pub async fn complete(&self, code: &str) -> Result<TokenPair, AuthError> {
        if code.trim().is_empty() {
            return Err(AuthError::validation("missing authorization code"));
        }
        let provider = self.provider.name().to_string();

        let tokens = with_timeout(
            self.io_timeout,
            "token exchange",
            self.provider.exchange_code(code),
        )
        .await?;

        let profile = with_timeout(
            self.io_timeout,
            "profile fetch",
            self.provider.fetch_profile(&tokens),
        )
        .await?;
        if profile.email.trim().is_empty() {
            return Err(AuthError::UpstreamUnavailable(
                "provider profile has no email".to_string(),
            ));
        }

        let (user, outcome) = self.reconcile(&profile, &tokens).await?;
        tracing::info!(user_id = %user.id, provider = %provider, ?outcome, "oauth identity reconciled");

        self.sessions
            .issue_for_user(&user, &oauth_provider_tag(&provider))
            .await
    }

    /// Maps the provider identity onto a local user and credential.
    pub async fn reconcile(
        &self,
        profile: &ProviderProfile,
        tokens: &ProviderTokens,
    ) -> Result<(user::Model, ReconcileOutcome), AuthError> {
        let provider = self.provider.name();
        let credential = NewOAuthCredential {
            provider: provider.to_string(),
            provider_id: profile.subject.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at.map(|at| at.fixed_offset()),
        };

        let existing = with_timeout(
            self.io_timeout,
            "user lookup",
            self.users.find_by_email(profile.email.trim()),
        )
        .await?;

        let Some(user) = existing else {
            let (created, _) = with_timeout(
                self.io_timeout,
                "user create",
                self.credentials.create_user_with_credential(
                    NewUser {
                        email: profile.email.trim().to_string(),
                        password_hash: None,
                        full_name: profile.name.clone().unwrap_or_default(),
                        avatar_path: profile.picture.clone(),
                        email_verified: profile.email_verified,
                        role_id: None,
                    },
                    credential,
                ),
            )
            .await?;
            return Ok((created, ReconcileOutcome::CreatedUser));
        };

        let linked = with_timeout(
            self.io_timeout,
            "credential lookup",
            self.credentials.find(user.id, provider),
        )
        .await?;

        let outcome = match linked {
            None => {
                with_timeout(
                    self.io_timeout,
                    "credential create",
                    self.credentials.create(user.id, credential),
                )
                .await?;
                ReconcileOutcome::LinkedExistingUser
            }
            Some(mut stored) => {
                stored.access_token = credential.access_token;
                stored.refresh_token = credential.refresh_token;
                stored.expires_at = credential.expires_at;
                with_timeout(
                    self.io_timeout,
                    "credential update",
                    self.credentials.update(stored),
                )
                .await?;
                ReconcileOutcome::RefreshedCredential
            }
        };

        let user = if profile.email_verified && !user.email_verified {
            let mut verified = user;
            verified.email_verified = true;
            with_timeout(self.io_timeout, "user update", self.users.update(verified)).await?
        } else {
            user
        };

        Ok((user, outcome))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{
        IdentityProvider, OAuthLinker, ProviderProfile, ProviderTokens, ReconcileOutcome,
        verify_state,
    };
    use crate::auth::error::AuthError;
    use crate::auth::jwt::TokenService;
    use crate::auth::rbac::RbacResolver;
    use crate::auth::session::{SessionManager, SessionSettings};
    use crate::auth::session_store::MemorySessionStore;
    use crate::db::directory::{NewUser, OAuthCredentialStore, UserDirectory};
    use crate::db::memory::MemoryDirectory;

    struct FakeProvider {
        profile: ProviderProfile,
        exchanges: AtomicUsize,
        fail_exchange: bool,
        profile_delay: Duration,
    }

    impl FakeProvider {
        fn new(email: &str, verified: bool) -> Self {
            Self {
                profile: ProviderProfile {
                    subject: "g-42".to_string(),
                    email: email.to_string(),
                    email_verified: verified,
                    name: Some("Ada".to_string()),
                    picture: None,
                },
                exchanges: AtomicUsize::new(0),
                fail_exchange: false,
                profile_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn name(&self) -> &str {
            "google"
        }

        fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
            Ok(format!("https://idp.example.com/auth?state={state}"))
        }

        async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError> {
            if self.fail_exchange {
                return Err(AuthError::ExchangeFailed("bad code".to_string()));
            }
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderTokens {
                access_token: format!("{code}-access-{n}"),
                refresh_token: Some(format!("{code}-refresh-{n}")),
                expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            })
        }

        async fn fetch_profile(&self, _tokens: &ProviderTokens) -> Result<ProviderProfile, AuthError> {
            if !self.profile_delay.is_zero() {
                tokio::time::sleep(self.profile_delay).await;
            }
            Ok(self.profile.clone())
        }
    }

    fn linker(directory: &MemoryDirectory, provider: FakeProvider) -> OAuthLinker {
        let timeout = Duration::from_millis(200);
        let sessions = SessionManager::new(
            Arc::new(directory.clone()),
            Arc::new(MemorySessionStore::new()),
            RbacResolver::new(Arc::new(directory.clone()), timeout),
            TokenService::new("oauth-test-secret", Duration::from_secs(900)),
            SessionSettings {
                access_ttl: Duration::from_secs(900),
                refresh_ttl: Duration::from_secs(86_400),
                io_timeout: timeout,
                default_role: "user".to_string(),
            },
        );
        OAuthLinker::new(
            Arc::new(provider),
            Arc::new(directory.clone()),
            Arc::new(directory.clone()),
            sessions,
            timeout,
        )
    }

    #[test]
    fn state_must_match_exactly() {
        verify_state("abc123", "abc123").expect("matching state");
        assert!(verify_state("abc123", "abc124").is_err());
        assert!(verify_state("abc", "abcd").is_err());
        assert!(verify_state("", "").is_err());
    }

    #[test]
    fn authorization_request_embeds_fresh_state() {
        let linker = linker(&MemoryDirectory::new(), FakeProvider::new("a@x.com", true));
        let first = linker.authorization_request().expect("request");
        let second = linker.authorization_request().expect("request");
        assert_eq!(first.state.len(), 43);
        assert_ne!(first.state, second.state);
        assert!(first.url.ends_with(&first.state));
    }

    #[tokio::test]
    async fn first_and_second_callback_share_user_and_credential() {
        let directory = MemoryDirectory::new();
        let linker = linker(&directory, FakeProvider::new("new@x.com", true));

        let pair = linker.complete("code").await.expect("first callback");
        let claims = linker.sessions.tokens().verify(&pair.access_token).expect("verify");
        assert_eq!(claims.identity.provider, "oauth:google");

        let user = directory
            .find_by_email("new@x.com")
            .await
            .expect("lookup")
            .expect("user created");
        assert!(user.email_verified);
        assert!(user.password_hash.is_none());
        let first = OAuthCredentialStore::find(&directory, user.id, "google")
            .await
            .expect("lookup")
            .expect("credential created");

        linker.complete("code").await.expect("second callback");
        let second = OAuthCredentialStore::find(&directory, user.id, "google")
            .await
            .expect("lookup")
            .expect("credential kept");
        assert_eq!(first.id, second.id);
        assert_ne!(first.access_token, second.access_token);
        assert_eq!(second.provider_id, "g-42");
    }

    #[tokio::test]
    async fn existing_password_user_gets_linked_and_verified() {
        let directory = MemoryDirectory::new();
        let user = UserDirectory::create(
            &directory,
            NewUser {
                email: "ada@x.com".to_string(),
                password_hash: Some("hash".to_string()),
                full_name: "Ada".to_string(),
                avatar_path: None,
                email_verified: false,
                role_id: None,
            },
        )
        .await
        .expect("create");
        let linker = linker(&directory, FakeProvider::new("ada@x.com", true));

        let tokens = ProviderTokens {
            access_token: "at".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        let profile = linker.provider.fetch_profile(&tokens).await.expect("profile");
        let (linked, outcome) = linker.reconcile(&profile, &tokens).await.expect("reconcile");
        assert_eq!(outcome, ReconcileOutcome::LinkedExistingUser);
        assert_eq!(linked.id, user.id);
        assert!(linked.email_verified);

        let (_, outcome) = linker.reconcile(&profile, &tokens).await.expect("reconcile");
        assert_eq!(outcome, ReconcileOutcome::RefreshedCredential);
    }

    #[tokio::test]
    async fn exchange_failure_issues_nothing() {
        let directory = MemoryDirectory::new();
        let mut provider = FakeProvider::new("x@x.com", true);
        provider.fail_exchange = true;
        let linker = linker(&directory, provider);

        assert!(matches!(
            linker.complete("bad").await,
            Err(AuthError::ExchangeFailed(_))
        ));
        assert!(!directory.email_exists("x@x.com").await.expect("lookup"));
    }

    #[tokio::test]
    async fn empty_profile_email_is_upstream_failure() {
        let directory = MemoryDirectory::new();
        let linker = linker(&directory, FakeProvider::new("", true));

        assert!(matches!(
            linker.complete("code").await,
            Err(AuthError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn slow_profile_fetch_times_out() {
        let directory = MemoryDirectory::new();
        let mut provider = FakeProvider::new("slow@x.com", true);
        provider.profile_delay = Duration::from_secs(5);
        let linker = linker(&directory, provider);

        let err = linker.complete("code").await.expect_err("should time out");
        assert!(matches!(err, AuthError::Timeout("profile fetch")));
        assert!(!directory.email_exists("slow@x.com").await.expect("lookup"));
    }
}
