//! Bookmark list state shared by every renderer.
//!
//! DESIGN
//! ======
//! `BookmarkList` owns the local collection, the add-form draft, the single
//! row in edit mode, and the last error notice. Renderers (the server page,
//! the CLI watcher) read from it; store calls are made by the caller.
//!
//! A rejected add puts the typed values back in `draft` so the form comes back
//! filled in. A submitted edit goes through [`EditState::into_commit`], and only
//! [`EditCommit::Save`] leads to a store call.

use uuid::Uuid;

use crate::change::{ChangeEvent, apply_change};
use crate::model::{Bookmark, normalize_title, sort_newest_first};

/// The row currently in edit mode and its unsaved title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub id: Uuid,
    pub title: String,
}

impl EditState {
    /// Decide what a submitted edit sends to the store. A title that trims
    /// to nothing cancels the edit.
    #[must_use]
    pub fn into_commit(self) -> EditCommit {
        match normalize_title(&self.title) {
            Some(title) => EditCommit::Save { id: self.id, title },
            None => EditCommit::Cancel { id: self.id },
        }
    }
}

/// What to do once an edit is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommit {
    /// Send `title` to the store for row `id`.
    Save { id: Uuid, title: String },
    /// The trimmed title was empty; leave the store untouched.
    Cancel { id: Uuid },
}

/// Unsaved add-form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct BookmarkList {
    items: Vec<Bookmark>,
    editing: Option<EditState>,
    pub draft: Draft,
    error: Option<String>,
}

impl BookmarkList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a fresh load, newest first.
    #[must_use]
    pub fn from_items(items: Vec<Bookmark>) -> Self {
        let mut list = Self::new();
        list.replace_all(items);
        list
    }

    /// Replace the collection with a full reload. Edit mode survives only if
    /// the row being edited is still present.
    pub fn replace_all(&mut self, mut items: Vec<Bookmark>) {
        sort_newest_first(&mut items);
        self.items = items;
        if let Some(id) = self.editing_id() {
            if self.get(id).is_none() {
                self.editing = None;
            }
        }
    }

    #[must_use]
    pub fn items(&self) -> &[Bookmark] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Bookmark> {
        self.items.iter().find(|b| b.id == id)
    }

    /// Apply a realtime event. Deleting the row in edit mode ends the edit.
    pub fn apply(&mut self, event: ChangeEvent) {
        let deleted = match &event {
            ChangeEvent::Delete(key) => Some(key.id),
            _ => None,
        };
        apply_change(&mut self.items, event);
        if deleted.is_some() && deleted == self.editing_id() {
            self.editing = None;
        }
    }

    // =========================================================================
    // EDIT MODE
    // =========================================================================

    /// Put a row into edit mode, replacing any other row's edit.
    /// Returns `false` (and changes nothing) if the row is not present.
    pub fn start_edit(&mut self, id: Uuid) -> bool {
        let Some(row) = self.get(id) else {
            return false;
        };
        self.editing = Some(EditState { id, title: row.title.clone() });
        true
    }

    #[must_use]
    pub fn editing(&self) -> Option<&EditState> {
        self.editing.as_ref()
    }

    #[must_use]
    pub fn editing_id(&self) -> Option<Uuid> {
        self.editing.as_ref().map(|e| e.id)
    }

    #[must_use]
    pub fn is_editing(&self, id: Uuid) -> bool {
        self.editing_id() == Some(id)
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
