//! Runtime configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if present) and builds one `AppConfig` before any
//! connection is opened. Everything except `DATABASE_URL` has a default;
//! OAuth is optional and the login routes answer `503` without it.

use std::time::Duration;

use crate::services::identity::OAuthConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 3600;
pub const DEFAULT_SESSION_LOOKUP_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_REALTIME_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),
}

/// Session lifetimes and cookie policy.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Lifetime of the access token held in the `session_token` cookie.
    pub access_ttl: time::Duration,
    /// Lifetime of the refresh token held in the `refresh_token` cookie.
    pub refresh_ttl: time::Duration,
    /// Upper bound on a gate session lookup. Exceeding it fails closed.
    pub lookup_timeout: Duration,
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl: time::Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            refresh_ttl: time::Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            lookup_timeout: Duration::from_millis(DEFAULT_SESSION_LOOKUP_TIMEOUT_MS),
            cookie_secure: false,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            access_ttl: time::Duration::seconds(env_parse("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)),
            refresh_ttl: time::Duration::seconds(env_parse("REFRESH_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)),
            lookup_timeout: Duration::from_millis(env_parse(
                "SESSION_LOOKUP_TIMEOUT_MS",
                DEFAULT_SESSION_LOOKUP_TIMEOUT_MS,
            )),
            cookie_secure: cookie_secure(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub realtime_capacity: usize,
    pub sessions: SessionConfig,
    /// `None` when any required `OAUTH_*` variable is missing.
    pub oauth: Option<OAuthConfig>,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            realtime_capacity: env_parse("REALTIME_CHANNEL_CAPACITY", DEFAULT_REALTIME_CHANNEL_CAPACITY),
            sessions: SessionConfig::from_env(),
            oauth: OAuthConfig::from_env(),
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// `COOKIE_SECURE` wins; otherwise infer from the OAuth redirect scheme.
fn cookie_secure() -> bool {
    if let Some(value) = env_bool("COOKIE_SECURE") {
        return value;
    }

    std::env::var("OAUTH_REDIRECT_URI")
        .map(|uri| uri.starts_with("https://"))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
