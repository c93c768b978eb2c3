//! Realtime change fan-out: Postgres `LISTEN` to per-user subscriptions.
//!
//! DESIGN
//! ======
//! One background task holds a `PgListener` on [`CHANGE_CHANNEL`], decodes
//! each notification into a [`ChangeEvent`] and publishes it on the
//! [`ChangeHub`] (a tokio `broadcast` channel). Each websocket owns one
//! [`Subscription`], which filters the shared stream down to rows owned by
//! its user.
//!
//! NOTIFY caps payloads below 8000 bytes. For a row too large to inline, the
//! trigger sends `{eventType, id, user_id}` and the listener reads the row
//! back through the bookmark store, scoped to that owner.
//!
//! LIFECYCLE
//! =========
//! `subscribe` returns a `Subscribing` subscription that is already counted
//! in `active`. `confirm` (or the first `next`) moves it to `Subscribed`.
//! `release` runs at most once (explicitly or on drop). A lagging receiver
//! or a closed hub moves it to `Error`; there is no automatic reconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;
use shelf::{ChangeError, ChangeEvent, ChangeKind, RowKey, SubscriptionState};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::bookmark::BookmarkStore;

/// Notification channel written by the `bookmarks_notify` trigger.
pub const CHANGE_CHANNEL: &str = "bookmark_changes";

const LISTENER_RETRY: Duration = Duration::from_secs(2);

// =============================================================================
// HUB
// =============================================================================

/// Shared fan-out point for decoded change events.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
    active: Arc<AtomicUsize>,
}

impl ChangeHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, active: Arc::new(AtomicUsize::new(0)) }
    }

    /// Publish an event to every live receiver. Returns how many received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Open a subscription that yields only `user_id`'s rows. It starts in
    /// `Subscribing`; events published from here on are buffered for it.
    #[must_use]
    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        let rx = self.tx.subscribe();
        self.active.fetch_add(1, Ordering::SeqCst);
        debug!(%user_id, "realtime: subscribing");
        Subscription {
            user_id,
            rx: Some(rx),
            state: SubscriptionState::Subscribing,
            active: Arc::clone(&self.active),
        }
    }

    /// Number of subscriptions not yet released.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

pub struct Subscription {
    user_id: Uuid,
    rx: Option<broadcast::Receiver<ChangeEvent>>,
    state: SubscriptionState,
    active: Arc<AtomicUsize>,
}

impl Subscription {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Move `Subscribing` to `Subscribed`. Returns whether the subscription
    /// is live afterwards; released or failed subscriptions stay as they are.
    pub fn confirm(&mut self) -> bool {
        if self.state == SubscriptionState::Subscribing {
            self.state = SubscriptionState::Subscribed;
            info!(user_id = %self.user_id, "realtime: subscribed");
        }
        self.state == SubscriptionState::Subscribed
    }

    /// Wait for the next change to one of this user's rows. Confirms a
    /// `Subscribing` subscription first.
    ///
    /// Returns `None` once the subscription is released or has failed; the
    /// state then tells which. Events without a known owner are skipped.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        if !self.confirm() {
            return None;
        }
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) => {
                    if event.owner() == Some(self.user_id) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(user_id = %self.user_id, skipped, "realtime: subscriber lagged");
                    self.state = SubscriptionState::Error;
                    return None;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!(user_id = %self.user_id, "realtime: hub closed");
                    self.state = SubscriptionState::Error;
                    return None;
                }
            }
        }
    }

    /// Drop the receiver and leave the active count. Safe to call twice.
    pub fn release(&mut self) {
        if !self.state.holds_transport() {
            return;
        }
        self.rx = None;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.state = SubscriptionState::Unsubscribed;
        debug!(user_id = %self.user_id, "realtime: released");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// LISTENER
// =============================================================================

/// What the trigger sent: a full change, or a reference to a row too large
/// to inline.
#[derive(Debug, PartialEq, Eq)]
enum Notification {
    Change(ChangeEvent),
    Reference(RowRef),
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
struct RowRef {
    #[serde(rename = "eventType")]
    event_type: ChangeKind,
    id: Uuid,
    user_id: Uuid,
}

fn decode_notification(payload: &str) -> Result<Notification, ChangeError> {
    // Full payloads nest the row under `new`/`old`; only references carry a
    // top-level `id`.
    if let Ok(reference) = serde_json::from_str::<RowRef>(payload) {
        return Ok(Notification::Reference(reference));
    }
    ChangeEvent::parse(payload).map(Notification::Change)
}

/// Read a referenced row back as the owner would see it. `None` if the row
/// is already gone (its delete event follows) or the read fails.
async fn resolve_reference(store: &dyn BookmarkStore, reference: RowRef) -> Option<ChangeEvent> {
    let RowRef { event_type, id, user_id } = reference;
    if event_type == ChangeKind::Delete {
        return Some(ChangeEvent::Delete(RowKey { id, user_id: Some(user_id) }));
    }
    match store.get(user_id, id).await {
        Ok(Some(row)) if event_type == ChangeKind::Insert => Some(ChangeEvent::Insert(row)),
        Ok(Some(row)) => Some(ChangeEvent::Update(row)),
        Ok(None) => {
            debug!(%id, %user_id, "realtime: referenced row is gone");
            None
        }
        Err(e) => {
            warn!(error = %e, %id, %user_id, "realtime: could not read referenced row");
            None
        }
    }
}

/// Decode one notification payload and publish it. Malformed payloads are
/// logged and dropped; references are resolved through `store` first.
pub async fn dispatch_notification(hub: &ChangeHub, store: &dyn BookmarkStore, payload: &str) -> Option<usize> {
    let event = match decode_notification(payload) {
        Ok(Notification::Change(event)) => event,
        Ok(Notification::Reference(reference)) => resolve_reference(store, reference).await?,
        Err(e) => {
            warn!(error = %e, "realtime: dropping malformed notification");
            return None;
        }
    };
    debug!(kind = %event.kind(), id = %event.id(), "realtime: change");
    Some(hub.publish(event))
}

/// Spawn the background task that feeds `hub` from Postgres notifications.
/// Connection failures are logged and retried after a short pause.
pub fn spawn_change_listener(
    pool: PgPool,
    hub: ChangeHub,
    store: Arc<dyn BookmarkStore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = listen(&pool, &hub, store.as_ref()).await {
                error!(error = %e, "realtime: listener failed; retrying");
            }
            tokio::time::sleep(LISTENER_RETRY).await;
        }
    })
}

async fn listen(pool: &PgPool, hub: &ChangeHub, store: &dyn BookmarkStore) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    info!(channel = CHANGE_CHANNEL, "realtime: listening");

    loop {
        let notification = listener.recv().await?;
        dispatch_notification(hub, store, notification.payload()).await;
    }
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;
