//! HTML page routes and their form endpoints. All sit behind the session gate.
//!
//! Form posts answer `303 See Other` back to `/bookmarks`; failures add an
//! `?error=<code>` the list page turns into a notice. A rejected add is the
//! exception: the page is rendered in place so the typed title and url stay
//! in the form.

use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use shelf::{BookmarkList, Draft, EditCommit, EditState};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::routes::bookmarks::store_error_to_status;
use crate::routes::gate::BOOKMARKS_PATH;
use crate::services::bookmark::{self, StoreError, UpdateOutcome};
use crate::services::session::SessionUser;
use crate::state::AppState;
use crate::views;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Row to show in edit mode. Unknown or malformed ids are ignored.
    edit: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameForm {
    #[serde(default)]
    title: String,
}

fn log_failure(e: &StoreError, user_id: Uuid, action: &'static str) {
    match e {
        StoreError::Database(_) => error!(error = %e, %user_id, action, "pages: store call failed"),
        _ => warn!(error = %e, %user_id, action, "pages: request rejected"),
    }
}

fn back_to_list(result: Result<(), StoreError>, user_id: Uuid, action: &'static str) -> Redirect {
    match result {
        Ok(()) => Redirect::to(BOOKMARKS_PATH),
        Err(e) => {
            log_failure(&e, user_id, action);
            Redirect::to(&format!("{BOOKMARKS_PATH}?error={}", e.code()))
        }
    }
}

/// Load the user's rows. A failed load renders as an empty list with a notice.
async fn load_list(state: &AppState, user: &SessionUser) -> BookmarkList {
    let mut list = BookmarkList::new();
    match bookmark::list_bookmarks(state.store.as_ref(), user.id).await {
        Ok(rows) => list.replace_all(rows),
        Err(e) => {
            error!(error = %e, user_id = %user.id, "pages: list failed");
            list.set_error(views::error_message(e.code()));
        }
    }
    list
}

/// `GET /`: landing page. Signed-in users never get here; the gate
/// redirects them to `/bookmarks`.
pub async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(views::landing_page(state.identity.is_some()))
}

/// `GET /bookmarks`: the signed-in user's list.
pub async fn bookmarks_page(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Html<String> {
    let mut list = load_list(&state, &auth.user).await;

    if let Some(id) = query.edit.as_deref().and_then(|raw| Uuid::parse_str(raw).ok()) {
        list.start_edit(id);
    }
    if let Some(code) = query.error.as_deref() {
        list.set_error(views::error_message(code));
    }

    Html(views::bookmarks_page(&auth.user, &list))
}

/// `POST /bookmarks`: add form. On failure the list is re-rendered with the
/// typed values kept in the form.
pub async fn add_bookmark(State(state): State<AppState>, auth: AuthUser, Form(form): Form<AddForm>) -> Response {
    let draft = Draft { title: form.title, url: form.url };
    match bookmark::insert_bookmark(state.store.as_ref(), auth.user.id, &draft.title, &draft.url).await {
        Ok(row) => {
            info!(id = %row.id, user_id = %auth.user.id, "bookmark added");
            Redirect::to(BOOKMARKS_PATH).into_response()
        }
        Err(e) => {
            log_failure(&e, auth.user.id, "add");
            let mut list = load_list(&state, &auth.user).await;
            list.draft = draft;
            list.set_error(views::error_message(e.code()));
            (store_error_to_status(e), Html(views::bookmarks_page(&auth.user, &list))).into_response()
        }
    }
}

/// `POST /bookmarks/{id}/title`: edit-in-place form. A blank title leaves
/// edit mode without a store call.
pub async fn rename_bookmark(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Form(form): Form<RenameForm>,
) -> Redirect {
    let result = match (EditState { id, title: form.title }).into_commit() {
        EditCommit::Save { id, title } => bookmark::update_bookmark(state.store.as_ref(), auth.user.id, id, &title)
            .await
            .map(|outcome| {
                if let UpdateOutcome::Updated(_) = outcome {
                    info!(%id, "bookmark renamed");
                }
            }),
        EditCommit::Cancel { id } => {
            info!(%id, "empty title; edit cancelled");
            Ok(())
        }
    };
    back_to_list(result, auth.user.id, "rename")
}

/// `POST /bookmarks/{id}/delete`: immediate, no confirmation.
pub async fn delete_bookmark(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Redirect {
    let result = bookmark::delete_bookmark(state.store.as_ref(), auth.user.id, id).await;
    if result.is_ok() {
        info!(%id, "bookmark deleted");
    }
    back_to_list(result, auth.user.id, "delete")
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
