//! Bookmark rows and required-field validation.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Error returned when a required bookmark field is blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("url is required")]
    EmptyUrl,
}

impl ValidationError {
    /// Short grepable code, used in redirect query strings and API bodies.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::EmptyTitle => "empty_title",
            Self::EmptyUrl => "empty_url",
        }
    }
}

/// One row of the `bookmarks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    /// Owning user. Never rewritten after insert.
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A validated insert request: both fields trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    title: String,
    url: String,
}

impl NewBookmark {
    /// Validate raw form input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTitle`] or [`ValidationError::EmptyUrl`]
    /// when the trimmed field is empty. Title is checked first.
    pub fn new(title: &str, url: &str) -> Result<Self, ValidationError> {
        let title = normalize_title(title).ok_or(ValidationError::EmptyTitle)?;
        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        Ok(Self { title, url: url.to_owned() })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Trim a title, returning `None` when nothing is left.
#[must_use]
pub fn normalize_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Sort by `created_at` descending. Stable, so ties keep their order.
pub fn sort_newest_first(items: &mut [Bookmark]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
