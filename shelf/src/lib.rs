//! Shared bookmark model, realtime change events, and list-view state.
//!
//! This crate owns the types used by both `server` and `cli`: the typed
//! `Bookmark` row, the `{eventType, new, old}` change payload emitted by the
//! store, the reducer that folds those events into a local collection, and
//! the UI-independent list state used by every renderer.

mod change;
mod model;
mod view;

pub use change::{ChangeError, ChangeEvent, ChangeKind, RowKey, StreamMessage, SubscriptionState, apply_change};
pub use model::{Bookmark, NewBookmark, ValidationError, normalize_title, sort_newest_first};
pub use view::{BookmarkList, Draft, EditCommit, EditState};
