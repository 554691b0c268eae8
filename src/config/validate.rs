use anyhow::{Result, bail};

use super::{AppConfig, SessionStoreKind};

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.general.host.trim().is_empty() {
        errors.push("general.host must not be empty".to_string());
    }

    if let Some(database) = cfg.database.as_ref() {
        if database.url.trim().is_empty() {
            errors.push("database.url must not be empty".to_string());
        }

        if database.min_idle > database.max_connections {
            errors.push(format!(
                "database.min_idle ({}) must be <= database.max_connections ({})",
                database.min_idle, database.max_connections
            ));
        }
    }

    if let Some(auth) = cfg.auth.as_ref() {
        if auth.jwt_secret.trim().is_empty() {
            errors.push("auth.jwt_secret must not be empty".to_string());
        }

        if auth.admin_email.trim().is_empty() {
            errors.push("auth.admin_email must not be empty".to_string());
        }

        if auth.admin_password.len() < 8 {
            errors.push("auth.admin_password must be at least 8 characters".to_string());
        }

        if auth.default_role.trim().is_empty() {
            errors.push("auth.default_role must not be empty".to_string());
        }

        if auth.access_ttl_secs == 0 {
            errors.push("auth.access_ttl_secs must be > 0".to_string());
        }

        if auth.refresh_ttl_secs <= auth.access_ttl_secs {
            errors.push(
                "auth.refresh_ttl_secs must be greater than auth.access_ttl_secs".to_string(),
            );
        }

        if auth.io_timeout_ms == 0 {
            errors.push("auth.io_timeout_ms must be > 0".to_string());
        }

        if auth.session_store == SessionStoreKind::Database && cfg.database.is_none() {
            errors.push("auth.session_store = \"database\" requires a database section".to_string());
        }
    }

    if let Some(oauth) = cfg.oauth.as_ref() {
        if cfg.auth.is_none() {
            errors.push("oauth requires an auth section".to_string());
        }

        for (field, value) in [
            ("oauth.provider", &oauth.provider),
            ("oauth.client_id", &oauth.client_id),
            ("oauth.client_secret", &oauth.client_secret),
            ("oauth.redirect_url", &oauth.redirect_url),
            ("oauth.auth_url", &oauth.auth_url),
            ("oauth.token_url", &oauth.token_url),
            ("oauth.userinfo_url", &oauth.userinfo_url),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{field} must not be empty"));
            }
        }
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}
