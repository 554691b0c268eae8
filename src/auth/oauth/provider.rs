use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Url;
use serde::Deserialize;

use crate::auth::error::AuthError;
use crate::config::OAuthConfig;

/// Tokens returned by the provider's code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider-side subject id.
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;
    fn authorization_url(&self, state: &str) -> Result<String, AuthError>;
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError>;
    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ProviderProfile, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Authorization-code flow against an OpenID Connect provider.
pub struct OidcIdentityProvider {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OidcIdentityProvider {
    pub fn new(config: OAuthConfig, request_timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| AuthError::UpstreamUnavailable(format!("http client: {err}")))?;
        Ok(Self { config, http })
    }
}

fn transport_error(what: &'static str, err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout(what)
    } else {
        AuthError::UpstreamUnavailable(format!("{what}: {err}"))
    }
}

/// `None` when the lifetime does not fit a timestamp; the token is then kept
/// without an expiry.
fn expiry_from(expires_in: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(expires_in).and_then(|ttl| Utc::now().checked_add_signed(ttl))
}

#[async_trait]
impl IdentityProvider for OidcIdentityProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        let scope = self.config.scope_list().join(" ");
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
                ("access_type", "offline"),
            ],
        )
        .map_err(|err| AuthError::validation(format!("invalid oauth.auth_url: {err}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .await
            .map_err(|err| match transport_error("token exchange", err) {
                AuthError::UpstreamUnavailable(reason) => AuthError::ExchangeFailed(reason),
                other => other,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint returned {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::ExchangeFailed(format!("token response: {err}")))?;

        Ok(ProviderTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: body.expires_in.and_then(expiry_from),
        })
    }

    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ProviderProfile, AuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|err| transport_error("profile fetch", err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::UpstreamUnavailable(format!(
                "userinfo endpoint returned {status}"
            )));
        }

        let body: UserInfoResponse = response
            .json()
            .await
            .map_err(|err| AuthError::UpstreamUnavailable(format!("userinfo response: {err}")))?;

        Ok(ProviderProfile {
            subject: body.sub,
            email: body.email,
            email_verified: body.email_verified,
            name: body.name,
            picture: body.picture,
        })
    }
}
