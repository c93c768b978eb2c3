//! Bookmark JSON API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use shelf::Bookmark;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::bookmark::{self, StoreError, UpdateOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateBookmarkBody {
    pub title: String,
    pub url: String,
}

#[derive(Deserialize)]
pub struct UpdateBookmarkBody {
    pub title: String,
}

/// `GET /api/bookmarks`: the caller's bookmarks, newest first.
pub async fn list(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Bookmark>>, StatusCode> {
    let rows = bookmark::list_bookmarks(state.store.as_ref(), auth.user.id)
        .await
        .map_err(store_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/bookmarks`: create a bookmark; `400` if a field is blank.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateBookmarkBody>,
) -> Result<(StatusCode, Json<Bookmark>), StatusCode> {
    let row = bookmark::insert_bookmark(state.store.as_ref(), auth.user.id, &body.title, &body.url)
        .await
        .map_err(store_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PATCH /api/bookmarks/{id}`: rename. A blank title is a no-op (`204`).
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBookmarkBody>,
) -> Result<Response, StatusCode> {
    let outcome = bookmark::update_bookmark(state.store.as_ref(), auth.user.id, id, &body.title)
        .await
        .map_err(store_error_to_status)?;
    Ok(match outcome {
        UpdateOutcome::Updated(row) => Json(row).into_response(),
        UpdateOutcome::Skipped => StatusCode::NO_CONTENT.into_response(),
    })
}

/// `DELETE /api/bookmarks/{id}`.
pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    bookmark::delete_bookmark(state.store.as_ref(), auth.user.id, id)
        .await
        .map_err(store_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn store_error_to_status(err: StoreError) -> StatusCode {
    match err {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Database(e) => {
            tracing::error!(error = %e, "bookmark store call failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "bookmarks_test.rs"]
mod tests;
