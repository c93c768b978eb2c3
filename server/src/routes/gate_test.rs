use super::*;
use axum::Router;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use std::time::Duration;
use tower::ServiceExt;

use crate::state::test_helpers;
#[cfg(feature = "live-db-tests")]
use crate::services::session::create_session;

fn gated_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "landing" }))
        .route("/bookmarks", get(|| async { "list" }))
        .route(
            "/bookmarks/whoami",
            get(|req: Request| async move {
                req.extensions().get::<SessionUser>().map(|u| u.name.clone()).unwrap_or_default()
            }),
        )
        .route_layer(from_fn_with_state(state.clone(), session_gate))
        .with_state(state)
}

fn get_with_cookie(path: &str, cookie: Option<&str>) -> Request {
    let mut builder = axum::http::Request::builder().uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(resp: &Response) -> &str {
    resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// decide
// =============================================================================

#[test]
fn bookmarks_without_session_redirects_to_landing() {
    assert_eq!(decide("/bookmarks", false), GateDecision::RedirectToLanding);
    assert_eq!(decide("/bookmarks/abc/title", false), GateDecision::RedirectToLanding);
}

#[test]
fn landing_with_session_redirects_to_bookmarks() {
    assert_eq!(decide("/", true), GateDecision::RedirectToBookmarks);
}

#[test]
fn bookmarks_with_session_passes() {
    assert_eq!(decide("/bookmarks", true), GateDecision::Pass);
    assert_eq!(decide("/bookmarks/abc/delete", true), GateDecision::Pass);
}

#[test]
fn unrelated_paths_pass_either_way() {
    for path in ["/", "/auth/callback", "/login", "/healthz"] {
        assert_eq!(decide(path, false), GateDecision::Pass, "{path}");
    }
    for path in ["/auth/callback", "/login", "/healthz"] {
        assert_eq!(decide(path, true), GateDecision::Pass, "{path}");
    }
}

#[test]
fn is_protected_matches_bookmarks_subtree_only() {
    assert!(is_protected("/bookmarks"));
    assert!(is_protected("/bookmarks/"));
    assert!(is_protected("/bookmarks/1/title"));
    assert!(!is_protected("/bookmarksx"));
    assert!(!is_protected("/"));
    assert!(!is_protected("/api/bookmarks"));
}

// =============================================================================
// session_gate
// =============================================================================

#[tokio::test]
async fn anonymous_landing_passes() {
    let app = gated_app(test_helpers::test_app_state());
    let resp = app.oneshot(get_with_cookie("/", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "landing");
}

#[tokio::test]
async fn anonymous_bookmarks_redirects_with_see_other() {
    let app = gated_app(test_helpers::test_app_state());
    let resp = app.oneshot(get_with_cookie("/bookmarks", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn unreachable_session_store_fails_closed() {
    let app = gated_app(test_helpers::test_app_state());
    let req = get_with_cookie("/bookmarks", Some("session_token=abc; refresh_token=def"));
    let resp = tokio::time::timeout(Duration::from_secs(5), app.oneshot(req)).await.unwrap().unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn slow_session_lookup_times_out_closed() {
    let mut state = test_helpers::test_app_state();
    state.sessions.lookup_timeout = Duration::from_millis(10);
    let app = gated_app(state);

    let req = get_with_cookie("/bookmarks", Some("session_token=abc"));
    let resp = tokio::time::timeout(Duration::from_secs(1), app.oneshot(req)).await.unwrap().unwrap();
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn landing_with_unverifiable_cookie_still_renders() {
    let app = gated_app(test_helpers::test_app_state());
    let resp = app.oneshot(get_with_cookie("/", Some("session_token=abc"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
async fn live_state() -> (AppState, SessionTokens) {
    let pool = test_helpers::integration_pool().await;
    let user_id = test_helpers::seed_user(&pool).await;
    let mut state = test_helpers::test_app_state();
    state.pool = pool;
    let tokens = create_session(&state.pool, user_id, &state.sessions).await.expect("session");
    (state, tokens)
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn signed_in_landing_redirects_to_bookmarks() {
    let (state, tokens) = live_state().await;
    let cookie = format!("session_token={}", tokens.access_token);
    let resp = gated_app(state).oneshot(get_with_cookie("/", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/bookmarks");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn signed_in_bookmarks_passes_with_user_attached() {
    let (state, tokens) = live_state().await;
    let cookie = format!("session_token={}", tokens.access_token);
    let resp = gated_app(state).oneshot(get_with_cookie("/bookmarks/whoami", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "Test User");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn refresh_cookie_alone_rotates_session() {
    let (state, tokens) = live_state().await;
    let cookie = format!("refresh_token={}", tokens.refresh_token);
    let resp = gated_app(state).oneshot(get_with_cookie("/bookmarks", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookies: Vec<_> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(set_cookies.iter().any(|c| c.starts_with("session_token=")));
    assert!(set_cookies.iter().any(|c| c.starts_with("refresh_token=")));
}
