//! Realtime change events and the reducer that applies them.
//!
//! DESIGN
//! ======
//! The store emits loosely shaped `{eventType, new, old}` payloads. They are
//! decoded once, at this boundary, into the tagged [`ChangeEvent`] enum, so
//! everything downstream works with typed rows. [`apply_change`] is a plain
//! function over a `Vec<Bookmark>` and never touches a view or a socket.
//!
//! ORDERING
//! ========
//! Events are applied in arrival order. Inserts are prepended without a
//! re-sort, so an insert that arrives late can sit above a newer row until
//! the next full load.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::Bookmark;

// =============================================================================
// TYPES
// =============================================================================

/// Mutation kind carried in the `eventType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a deleted row. Delete payloads may carry only a partial `old`
/// snapshot, so the owner is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowKey {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Error returned when a change payload cannot be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    #[error("invalid change payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{kind} event is missing its `{field}` row")]
    MissingRow { kind: ChangeKind, field: &'static str },
    #[error("malformed `{field}` row: {source}")]
    Row {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded change to one row of the `bookmarks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChange", into = "RawChange")]
pub enum ChangeEvent {
    Insert(Bookmark),
    Update(Bookmark),
    Delete(RowKey),
}

impl ChangeEvent {
    /// Decode a raw `{eventType, new, old}` JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeError`] for invalid JSON, a missing row snapshot, or a
    /// row that does not match the bookmark shape.
    pub fn parse(payload: &str) -> Result<Self, ChangeError> {
        let raw: RawChange = serde_json::from_str(payload)?;
        Self::try_from(raw)
    }

    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete(_) => ChangeKind::Delete,
        }
    }

    /// Identifier of the affected row.
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Insert(row) | Self::Update(row) => row.id,
            Self::Delete(key) => key.id,
        }
    }

    /// Owner of the affected row, if the payload says.
    #[must_use]
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Self::Insert(row) | Self::Update(row) => Some(row.user_id),
            Self::Delete(key) => key.user_id,
        }
    }
}

/// Wire shape of a change event, as produced by the store's notify trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChange {
    #[serde(rename = "eventType")]
    event_type: ChangeKind,
    #[serde(default)]
    new: Option<Value>,
    #[serde(default)]
    old: Option<Value>,
}

impl TryFrom<RawChange> for ChangeEvent {
    type Error = ChangeError;

    fn try_from(raw: RawChange) -> Result<Self, Self::Error> {
        match raw.event_type {
            ChangeKind::Insert => Ok(Self::Insert(decode_row(raw.new, ChangeKind::Insert, "new")?)),
            ChangeKind::Update => Ok(Self::Update(decode_row(raw.new, ChangeKind::Update, "new")?)),
            ChangeKind::Delete => Ok(Self::Delete(decode_row(raw.old, ChangeKind::Delete, "old")?)),
        }
    }
}

impl From<ChangeEvent> for RawChange {
    fn from(event: ChangeEvent) -> Self {
        let kind = event.kind();
        let (new, old) = match event {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => (serde_json::to_value(row).ok(), None),
            ChangeEvent::Delete(key) => (None, serde_json::to_value(key).ok()),
        };
        Self { event_type: kind, new, old }
    }
}

fn decode_row<T: serde::de::DeserializeOwned>(
    value: Option<Value>,
    kind: ChangeKind,
    field: &'static str,
) -> Result<T, ChangeError> {
    let value = value
        .filter(|v| !v.is_null())
        .ok_or(ChangeError::MissingRow { kind, field })?;
    serde_json::from_value(value).map_err(|source| ChangeError::Row { field, source })
}

// =============================================================================
// REDUCER
// =============================================================================

/// Fold one change event into a local collection.
///
/// - `Insert` prepends the row (or replaces it in place if the id is already
///   present, which happens when the initial load races the event).
/// - `Update` replaces the row with the same id; unknown ids are ignored.
/// - `Delete` removes the row with the same id; unknown ids are ignored.
pub fn apply_change(items: &mut Vec<Bookmark>, event: ChangeEvent) {
    match event {
        ChangeEvent::Insert(row) => {
            if let Some(slot) = items.iter_mut().find(|b| b.id == row.id) {
                *slot = row;
            } else {
                items.insert(0, row);
            }
        }
        ChangeEvent::Update(row) => {
            if let Some(slot) = items.iter_mut().find(|b| b.id == row.id) {
                *slot = row;
            }
        }
        ChangeEvent::Delete(key) => items.retain(|b| b.id != key.id),
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Lifecycle of a realtime subscription.
///
/// `Unsubscribed -> Subscribing -> Subscribed -> Unsubscribed` on teardown,
/// or `-> Error` when the transport fails. There is no automatic reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Subscribing,
    Subscribed,
    Error,
}

impl SubscriptionState {
    /// Whether the subscription holds a transport that must be released.
    #[must_use]
    pub fn holds_transport(self) -> bool {
        matches!(self, Self::Subscribing | Self::Subscribed | Self::Error)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsubscribed => "unsubscribed",
            Self::Subscribing => "subscribing",
            Self::Subscribed => "subscribed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message sent from the server to a realtime websocket client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// First message on a socket; the subscription is live.
    Subscribed { user_id: Uuid },
    /// One change to the subscriber's rows.
    Change { event: ChangeEvent },
}

#[cfg(test)]
#[path = "change_test.rs"]
mod tests;
