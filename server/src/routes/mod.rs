//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the server-rendered pages, the OAuth endpoints,
//! the JSON API, and the realtime websocket. Only the page routes sit behind
//! the session gate; API and websocket routes authenticate per request via
//! the `AuthUser` extractor and answer `401` instead of redirecting.

pub mod auth;
pub mod bookmarks;
pub mod gate;
pub mod pages;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, patch, post};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Gated HTML pages and their form endpoints.
fn page_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(pages::landing))
        .route("/bookmarks", get(pages::bookmarks_page).post(pages::add_bookmark))
        .route("/bookmarks/{id}/title", post(pages::rename_bookmark))
        .route("/bookmarks/{id}/delete", post(pages::delete_bookmark))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::session_gate))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/bookmarks", get(bookmarks::list).post(bookmarks::create))
        .route("/api/bookmarks/{id}", patch(bookmarks::update).delete(bookmarks::remove))
        .route("/api/ws", get(ws::handle_ws))
}

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(page_routes(&state))
        .merge(api_routes())
        .route("/login", get(auth::login_redirect))
        .route("/auth/login", get(auth::oauth_login))
        .route("/auth/callback", get(auth::oauth_callback))
        .route("/auth/logout", post(auth::logout))
        .route("/healthz", get(healthz))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
