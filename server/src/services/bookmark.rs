//! Bookmark store client: list, insert, rename, delete.
//!
//! DESIGN
//! ======
//! Routes talk to the store through the [`BookmarkStore`] trait; one
//! instance is built at startup and shared through `AppState`. The free
//! functions below are the operations routes call: they apply required-field
//! validation before any store call, then make exactly one store call.
//!
//! ROW-LEVEL SCOPING
//! =================
//! Every statement filters on `user_id`, and runs in a transaction with
//! `app.user_id` set so the table's row-level security policy rejects rows
//! the caller does not own even if a filter were missing.

use async_trait::async_trait;
use shelf::{Bookmark, NewBookmark, ValidationError, normalize_title};
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("bookmark not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Short grepable code, used in redirect query strings.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::NotFound(_) => "not_found",
            Self::Database(_) => "store",
        }
    }
}

/// Result of a rename request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Bookmark),
    /// The trimmed title was empty; the store was not called.
    Skipped,
}

/// The remote bookmark table, scoped by owner.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// All rows owned by `user_id`, newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Bookmark>, StoreError>;

    /// Row `id` if `user_id` owns it.
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Bookmark>, StoreError>;

    async fn insert(&self, user_id: Uuid, draft: &NewBookmark) -> Result<Bookmark, StoreError>;

    /// Set the title of row `id`. `Ok(None)` if no such row is owned by `user_id`.
    async fn update_title(&self, user_id: Uuid, id: Uuid, title: &str) -> Result<Option<Bookmark>, StoreError>;

    /// Delete row `id`. `Ok(false)` if no such row is owned by `user_id`.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// List the caller's bookmarks, newest first. Empty when there are none.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the store call fails.
pub async fn list_bookmarks(store: &dyn BookmarkStore, user_id: Uuid) -> Result<Vec<Bookmark>, StoreError> {
    store.list(user_id).await
}

/// Insert a bookmark owned by the caller.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] for a blank title or url (no store
/// call is made), or [`StoreError::Database`] if the insert fails.
pub async fn insert_bookmark(
    store: &dyn BookmarkStore,
    user_id: Uuid,
    title: &str,
    url: &str,
) -> Result<Bookmark, StoreError> {
    let draft = NewBookmark::new(title, url)?;
    store.insert(user_id, &draft).await
}

/// Rename a bookmark. A blank title is a no-op ([`UpdateOutcome::Skipped`]).
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if the row is not visible to the caller,
/// or [`StoreError::Database`] if the update fails.
pub async fn update_bookmark(
    store: &dyn BookmarkStore,
    user_id: Uuid,
    id: Uuid,
    title: &str,
) -> Result<UpdateOutcome, StoreError> {
    let Some(title) = normalize_title(title) else {
        return Ok(UpdateOutcome::Skipped);
    };
    store
        .update_title(user_id, id, &title)
        .await?
        .map(UpdateOutcome::Updated)
        .ok_or(StoreError::NotFound(id))
}

/// Delete a bookmark.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if the row is not visible to the caller,
/// or [`StoreError::Database`] if the delete fails.
pub async fn delete_bookmark(store: &dyn BookmarkStore, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
    if store.delete(user_id, id).await? {
        Ok(())
    } else {
        Err(StoreError::NotFound(id))
    }
}

// =============================================================================
// POSTGRES
// =============================================================================

#[derive(sqlx::FromRow)]
struct BookmarkRow {
    id: Uuid,
    title: String,
    url: String,
    user_id: Uuid,
    created_at: OffsetDateTime,
}

impl From<BookmarkRow> for Bookmark {
    fn from(row: BookmarkRow) -> Self {
        Self { id: row.id, title: row.title, url: row.url, user_id: row.user_id, created_at: row.created_at }
    }
}

/// [`BookmarkStore`] backed by the `bookmarks` table.
pub struct PgBookmarkStore {
    pool: PgPool,
}

impl PgBookmarkStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a transaction with the row-level security identity set.
    async fn scoped(&self, user_id: Uuid) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('app.user_id', $1, true)")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl BookmarkStore for PgBookmarkStore {
    async fn list(&self, user_id: Uuid) -> Result<Vec<Bookmark>, StoreError> {
        let mut tx = self.scoped(user_id).await?;
        let rows = sqlx::query_as::<_, BookmarkRow>(
            "SELECT id, title, url, user_id, created_at
             FROM bookmarks
             WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows.into_iter().map(Bookmark::from).collect())
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Bookmark>, StoreError> {
        let mut tx = self.scoped(user_id).await?;
        let row = sqlx::query_as::<_, BookmarkRow>(
            "SELECT id, title, url, user_id, created_at
             FROM bookmarks
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.map(Bookmark::from))
    }

    async fn insert(&self, user_id: Uuid, draft: &NewBookmark) -> Result<Bookmark, StoreError> {
        let mut tx = self.scoped(user_id).await?;
        let row = sqlx::query_as::<_, BookmarkRow>(
            "INSERT INTO bookmarks (title, url, user_id)
             VALUES ($1, $2, $3)
             RETURNING id, title, url, user_id, created_at",
        )
        .bind(draft.title())
        .bind(draft.url())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_title(&self, user_id: Uuid, id: Uuid, title: &str) -> Result<Option<Bookmark>, StoreError> {
        let mut tx = self.scoped(user_id).await?;
        let row = sqlx::query_as::<_, BookmarkRow>(
            "UPDATE bookmarks SET title = $1
             WHERE id = $2 AND user_id = $3
             RETURNING id, title, url, user_id, created_at",
        )
        .bind(title)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.map(Bookmark::from))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.scoped(user_id).await?;
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[path = "bookmark_test.rs"]
mod tests;
