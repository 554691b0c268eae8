use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};

use super::error::AuthError;
use super::types::{Claims, Identity};

/// Clock skew tolerated when checking `exp` and `nbf`.
pub const LEEWAY_SECS: u64 = 5;

#[derive(Clone)]
pub struct JwtKeys {
    pub enc: EncodingKey,
    pub dec: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        }
    }
}

/// Stateless HS256 signer and verifier for access tokens.
#[derive(Clone)]
pub struct TokenService {
    keys: Option<JwtKeys>,
    default_ttl: Duration,
}

impl TokenService {
    /// An empty secret leaves the service unable to sign or verify anything.
    pub fn new(secret: &str, default_ttl: Duration) -> Self {
        let keys = (!secret.is_empty()).then(|| JwtKeys::from_secret(secret.as_bytes()));
        Self { keys, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn keys(&self) -> Result<&JwtKeys, AuthError> {
        self.keys
            .as_ref()
            .ok_or_else(|| AuthError::Signing("no signing secret configured".to_string()))
    }

    pub fn issue(&self, identity: &Identity, ttl: Option<Duration>) -> Result<String, AuthError> {
        let keys = self.keys()?;
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = get_current_timestamp();
        let claims = Claims {
            identity: identity.clone(),
            iat: now,
            nbf: now,
            exp: now + ttl.as_secs(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".into());

        encode(&header, &claims, &keys.enc).map_err(|err| AuthError::Signing(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let keys = self.keys().map_err(|_| AuthError::InvalidSignature)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        decode_claims(token, keys, &validation)
    }

    /// Checks signature and structure but not the validity window, for the
    /// refresh path where the access token is expected to be stale.
    pub fn parse_ignoring_expiry(&self, token: &str) -> Result<Claims, AuthError> {
        let keys = self.keys().map_err(|_| AuthError::InvalidSignature)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode_claims(token, keys, &validation)
    }
}

// Registered claims are checked on the raw JSON so that a missing `exp`
// reports as such rather than as a shape mismatch.
fn decode_claims(token: &str, keys: &JwtKeys, validation: &Validation) -> Result<Claims, AuthError> {
    let raw = decode::<serde_json::Value>(token, &keys.dec, validation)?.claims;
    serde_json::from_value(raw).map_err(|err| AuthError::MalformedToken(err.to_string()))
}
