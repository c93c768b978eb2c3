//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool (sessions and users), the single bookmark
//! store, the optional identity provider, and the realtime change hub.
//! Every collaborator is built once in `main` and shared by the page
//! handlers, the JSON API, and the websocket relay.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::SessionConfig;
use crate::services::bookmark::BookmarkStore;
use crate::services::identity::IdentityProvider;
use crate::services::realtime::ChangeHub;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn BookmarkStore>,
    /// `None` if OAuth env vars are not configured; sign-in answers 503.
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub hub: ChangeHub,
    pub sessions: SessionConfig,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: PgPool,
        store: Arc<dyn BookmarkStore>,
        identity: Option<Arc<dyn IdentityProvider>>,
        hub: ChangeHub,
        sessions: SessionConfig,
    ) -> Self {
        Self { pool, store, identity, hub, sessions }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
