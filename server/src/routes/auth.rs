//! Auth routes: OAuth sign-in, the redirect handler, logout, current user.
//!
//! DESIGN
//! ======
//! `GET /auth/callback` always answers `303 /bookmarks`, whatever happened.
//! On success the response carries fresh session cookies; on failure the
//! error is logged and the session gate bounces the browser back to `/`.
//! The code is exchanged at most once per request, so a replayed code fails
//! at the provider and takes the same redirect.

use axum::extract::{FromRef, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::services::identity::{self, AuthError};
use crate::services::session::{self, SessionTokens, SessionUser};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const OAUTH_STATE_TTL: Duration = Duration::minutes(10);

// =============================================================================
// COOKIES
// =============================================================================

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Expire a cookie in the browser.
pub(crate) fn clear_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new(), secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// Add the access and refresh cookies for `tokens` to `jar`.
pub(crate) fn with_session_cookies(jar: CookieJar, tokens: &SessionTokens, config: &SessionConfig) -> CookieJar {
    let mut access = base_cookie(SESSION_COOKIE, tokens.access_token.clone(), config.cookie_secure);
    access.set_max_age(config.access_ttl);
    let mut refresh = base_cookie(REFRESH_COOKIE, tokens.refresh_token.clone(), config.cookie_secure);
    refresh.set_max_age(config.refresh_ttl);
    jar.add(access).add(refresh)
}

pub(crate) fn cookie_value<'a>(jar: &'a CookieJar, name: &str) -> Option<&'a str> {
    jar.get(name).map(Cookie::value).filter(|v| !v.is_empty())
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user for a request.
/// Use as a handler parameter to require authentication.
///
/// Behind the session gate the user is already in request extensions; API
/// routes fall back to validating the `session_token` cookie. A lookup that
/// errors or exceeds the configured bound is treated as signed out.
pub struct AuthUser {
    pub user: SessionUser,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<SessionUser>() {
            return Ok(Self { user: user.clone() });
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let token = cookie_value(&jar, SESSION_COOKIE).ok_or(StatusCode::UNAUTHORIZED)?;

        let app_state = AppState::from_ref(state);
        let lookup = session::validate_session(&app_state.pool, token);
        match tokio::time::timeout(app_state.sessions.lookup_timeout, lookup).await {
            Ok(Ok(Some(user))) => Ok(Self { user }),
            Ok(Ok(None)) => Err(StatusCode::UNAUTHORIZED),
            Ok(Err(e)) => {
                warn!(error = %e, "auth: session lookup failed");
                Err(StatusCode::UNAUTHORIZED)
            }
            Err(_) => {
                warn!("auth: session lookup timed out");
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /auth/login`: redirect to the provider's authorization page.
pub async fn oauth_login(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(provider) = &state.identity else {
        return (StatusCode::SERVICE_UNAVAILABLE, "OAuth not configured").into_response();
    };

    let oauth_state = session::generate_token();
    let url = match provider.authorize_url(&oauth_state) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "auth: cannot build authorization url");
            return (StatusCode::INTERNAL_SERVER_ERROR, "OAuth misconfigured").into_response();
        }
    };

    let mut cookie = base_cookie(OAUTH_STATE_COOKIE, oauth_state, state.sessions.cookie_secure);
    cookie.set_max_age(OAUTH_STATE_TTL);
    (jar.add(cookie), Redirect::temporary(&url)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    /// Set by the provider when the user denies consent.
    error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum CallbackError {
    #[error("OAuth not configured")]
    NotConfigured,
    #[error("provider returned error: {0}")]
    Provider(String),
    #[error("missing authorization code")]
    MissingCode,
    #[error("oauth state mismatch")]
    StateMismatch,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("session creation failed: {0}")]
    Session(#[from] sqlx::Error),
}

/// `GET /auth/callback`: exchange the code for a session, then `303 /bookmarks`.
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Response {
    let result = complete_sign_in(&state, &jar, &params).await;
    let jar = jar.add(clear_cookie(OAUTH_STATE_COOKIE, state.sessions.cookie_secure));

    let jar = match result {
        Ok(tokens) => {
            info!(user_id = %tokens.user_id, "auth: signed in");
            with_session_cookies(jar, &tokens, &state.sessions)
        }
        Err(e) => {
            warn!(error = %e, "auth: callback failed");
            jar
        }
    };
    (jar, Redirect::to("/bookmarks")).into_response()
}

async fn complete_sign_in(
    state: &AppState,
    jar: &CookieJar,
    params: &CallbackQuery,
) -> Result<SessionTokens, CallbackError> {
    let provider = state.identity.as_ref().ok_or(CallbackError::NotConfigured)?;
    if let Some(error) = &params.error {
        return Err(CallbackError::Provider(error.clone()));
    }
    let code = params.code.as_deref().filter(|c| !c.is_empty()).ok_or(CallbackError::MissingCode)?;

    // Verify OAuth CSRF state before the code is spent.
    let expected = cookie_value(jar, OAUTH_STATE_COOKIE);
    if expected.is_none() || expected != params.state.as_deref() {
        return Err(CallbackError::StateMismatch);
    }

    let profile = provider.exchange_code(code).await?;
    let user_id = identity::upsert_user(&state.pool, &profile).await?;
    Ok(session::create_session(&state.pool, user_id, &state.sessions).await?)
}

/// `GET /login`: the landing page doubles as the login page.
pub async fn login_redirect() -> Redirect {
    Redirect::temporary("/")
}

/// `POST /auth/logout`: delete the session, clear cookies, `303 /`.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let access = cookie_value(&jar, SESSION_COOKIE);
    let refresh = cookie_value(&jar, REFRESH_COOKIE);
    match session::delete_session(&state.pool, access, refresh).await {
        Ok(removed) => info!(removed, "auth: signed out"),
        Err(e) => warn!(error = %e, "auth: session delete failed"),
    }

    let secure = state.sessions.cookie_secure;
    let jar = jar.add(clear_cookie(SESSION_COOKIE, secure)).add(clear_cookie(REFRESH_COOKIE, secure));
    (jar, Redirect::to("/")).into_response()
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
