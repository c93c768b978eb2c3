//! Session gate: route-level redirects for the page router.
//!
//! DESIGN
//! ======
//! [`decide`] is a pure function of the path and whether a session exists.
//! The middleware resolves the session from cookies and then applies it:
//!
//! - signed out, path under `/bookmarks` → `303 /`
//! - signed in, path exactly `/` → `303 /bookmarks`
//! - otherwise pass through, with the user in request extensions
//!
//! FAILURE POLICY
//! ==============
//! The lookup is bounded by `SessionConfig::lookup_timeout`. A timeout or a
//! store error counts as signed out (fail closed). When only the refresh
//! cookie is valid, the session is rotated and the new cookies ride on
//! whatever response the request produces.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info, warn};

use crate::routes::auth::{REFRESH_COOKIE, SESSION_COOKIE, cookie_value, with_session_cookies};
use crate::services::session::{self, SessionTokens, SessionUser};
use crate::state::AppState;

pub const LANDING_PATH: &str = "/";
pub const BOOKMARKS_PATH: &str = "/bookmarks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    RedirectToLanding,
    RedirectToBookmarks,
}

/// `/bookmarks` and everything below it.
#[must_use]
pub fn is_protected(path: &str) -> bool {
    path.strip_prefix(BOOKMARKS_PATH)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[must_use]
pub fn decide(path: &str, authenticated: bool) -> GateDecision {
    if !authenticated && is_protected(path) {
        GateDecision::RedirectToLanding
    } else if authenticated && path == LANDING_PATH {
        GateDecision::RedirectToBookmarks
    } else {
        GateDecision::Pass
    }
}

// =============================================================================
// SESSION RESOLUTION
// =============================================================================

#[derive(Debug, Default)]
struct Resolved {
    user: Option<SessionUser>,
    /// Set when the refresh cookie was traded for a new pair.
    refreshed: Option<SessionTokens>,
}

async fn resolve_session(state: &AppState, jar: &CookieJar) -> Resolved {
    let access = cookie_value(jar, SESSION_COOKIE);
    let refresh = cookie_value(jar, REFRESH_COOKIE);
    if access.is_none() && refresh.is_none() {
        return Resolved::default();
    }

    match tokio::time::timeout(state.sessions.lookup_timeout, lookup(state, access, refresh)).await {
        Ok(Ok(resolved)) => resolved,
        Ok(Err(e)) => {
            warn!(error = %e, "gate: session lookup failed; treating as signed out");
            Resolved::default()
        }
        Err(_) => {
            warn!(timeout = ?state.sessions.lookup_timeout, "gate: session lookup timed out; treating as signed out");
            Resolved::default()
        }
    }
}

async fn lookup(state: &AppState, access: Option<&str>, refresh: Option<&str>) -> Result<Resolved, sqlx::Error> {
    if let Some(token) = access {
        if let Some(user) = session::validate_session(&state.pool, token).await? {
            return Ok(Resolved { user: Some(user), refreshed: None });
        }
    }
    if let Some(token) = refresh {
        if let Some((tokens, user)) = session::refresh_session(&state.pool, token, &state.sessions).await? {
            info!(user_id = %user.id, "gate: session refreshed");
            return Ok(Resolved { user: Some(user), refreshed: Some(tokens) });
        }
    }
    Ok(Resolved::default())
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Page-router middleware applying [`decide`].
pub async fn session_gate(State(state): State<AppState>, jar: CookieJar, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let resolved = resolve_session(&state, &jar).await;
    let decision = decide(&path, resolved.user.is_some());
    debug!(%path, ?decision, "gate");

    let jar = match &resolved.refreshed {
        Some(tokens) => with_session_cookies(jar, tokens, &state.sessions),
        None => jar,
    };

    match decision {
        GateDecision::RedirectToLanding => (jar, Redirect::to(LANDING_PATH)).into_response(),
        GateDecision::RedirectToBookmarks => (jar, Redirect::to(BOOKMARKS_PATH)).into_response(),
        GateDecision::Pass => {
            if let Some(user) = resolved.user {
                req.extensions_mut().insert(user);
            }
            (jar, next.run(req).await).into_response()
        }
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
