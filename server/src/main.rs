mod config;
mod db;
mod routes;
mod services;
mod state;
mod views;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::bookmark::{BookmarkStore, PgBookmarkStore};
use crate::services::identity::{HttpIdentityProvider, IdentityProvider};
use crate::services::realtime::{ChangeHub, spawn_change_listener};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    // Sign-in is optional: without OAuth config the landing page says so.
    let identity: Option<Arc<dyn IdentityProvider>> = match config.oauth.clone() {
        Some(oauth) => {
            tracing::info!(authorize_url = %oauth.authorize_url, "OAuth provider configured");
            Some(Arc::new(HttpIdentityProvider::new(oauth)))
        }
        None => {
            tracing::warn!("OAuth not configured; sign-in disabled");
            None
        }
    };

    let store: Arc<dyn BookmarkStore> = Arc::new(PgBookmarkStore::new(pool.clone()));
    let hub = ChangeHub::new(config.realtime_capacity);
    let _listener = spawn_change_listener(pool.clone(), hub.clone(), Arc::clone(&store));

    let state = state::AppState::new(pool, store, identity, hub, config.sessions);

    let app = routes::app(state);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "linkshelf listening");
    axum::serve(listener, app).await.expect("server failed");
}
