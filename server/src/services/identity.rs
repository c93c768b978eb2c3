//! OAuth identity service: authorization URL, code exchange, profile fetch,
//! user upsert.
//!
//! DESIGN
//! ======
//! The provider is reached through the [`IdentityProvider`] trait so the
//! callback route can be exercised without a network. The HTTP
//! implementation speaks plain OAuth 2.0 authorization-code + OIDC userinfo
//! and defaults to Google's endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub const OAUTH_SCOPE: &str = "openid email profile";

/// OAuth client configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuthConfig {
    /// Load from `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`, `OAUTH_REDIRECT_URI`,
    /// with optional `OAUTH_AUTHORIZE_URL`, `OAUTH_TOKEN_URL`,
    /// `OAUTH_USERINFO_URL` overrides.
    /// Returns `None` if any required variable is missing (sign-in disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("OAUTH_CLIENT_ID").ok()?;
        let client_secret = std::env::var("OAUTH_CLIENT_SECRET").ok()?;
        let redirect_uri = std::env::var("OAUTH_REDIRECT_URI").ok()?;
        let endpoint = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_owned());
        Some(Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url: endpoint("OAUTH_AUTHORIZE_URL", GOOGLE_AUTHORIZE_URL),
            token_url: endpoint("OAUTH_TOKEN_URL", GOOGLE_TOKEN_URL),
            userinfo_url: endpoint("OAUTH_USERINFO_URL", GOOGLE_USERINFO_URL),
        })
    }

    /// Build the provider authorization URL carrying `state`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the configured authorize URL is invalid.
    pub fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        let url = reqwest::Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", OAUTH_SCOPE),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Config(format!("{}: {e}", self.authorize_url)))?;
        Ok(url.into())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Identity claims returned by the provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderProfile {
    /// Stable subject identifier at the provider.
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl ProviderProfile {
    /// Name to show in the UI: provider name, else email, else the subject.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid provider configuration: {0}")]
    Config(String),
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("profile fetch failed: {0}")]
    Profile(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// The identity provider as seen by the auth routes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL to send the browser to, carrying the CSRF `state`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] when the URL cannot be built.
    fn authorize_url(&self, state: &str) -> Result<String, AuthError>;

    /// Exchange a one-time authorization code for the caller's profile.
    /// A replayed code fails at the provider.
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AuthError>;
}

/// [`IdentityProvider`] over HTTPS. One instance (and one connection pool)
/// is shared by every request.
pub struct HttpIdentityProvider {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl HttpIdentityProvider {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, AuthError> {
        let resp = self
            .http
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
        if !status.is_success() {
            return Err(AuthError::TokenExchange(format!("{status}: {body}")));
        }
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|_| AuthError::TokenExchange(format!("unexpected response: {body}")))?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError> {
        let resp = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .header("User-Agent", "linkshelf")
            .send()
            .await
            .map_err(|e| AuthError::Profile(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Profile(format!("{status}: {body}")));
        }

        resp.json::<ProviderProfile>()
            .await
            .map_err(|e| AuthError::Profile(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn authorize_url(&self, state: &str) -> Result<String, AuthError> {
        self.config.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AuthError> {
        let access_token = self.fetch_access_token(code).await?;
        self.fetch_profile(&access_token).await
    }
}

/// Upsert a user from their provider profile. Returns the user's UUID.
///
/// # Errors
///
/// Returns [`AuthError::Db`] if the upsert fails.
pub async fn upsert_user(pool: &PgPool, profile: &ProviderProfile) -> Result<Uuid, AuthError> {
    let row = sqlx::query(
        r"INSERT INTO users (provider_subject, email, name, avatar_url)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (provider_subject) DO UPDATE
          SET email = EXCLUDED.email, name = EXCLUDED.name, avatar_url = EXCLUDED.avatar_url
          RETURNING id",
    )
    .bind(&profile.sub)
    .bind(&profile.email)
    .bind(profile.display_name())
    .bind(&profile.picture)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
