//! Server-rendered HTML for the landing page and the bookmark list.
//!
//! DESIGN
//! ======
//! Pages are plain HTML rendered with Leptos `view!` and `to_html()`; there
//! is no hydration. Every mutation is an HTML form post answered with a
//! redirect, so the pages work without JavaScript. A small inline script
//! opens `/api/ws` and reloads the list when a change event arrives, unless
//! a row is in edit mode, in which case it only shows a notice.
//!
//! The page is rendered before the socket subscribes, so a change landing in
//! between would carry no event. The list container carries a
//! [`list_fingerprint`]; once the socket reports `subscribed` the script
//! fetches `/api/bookmarks` and treats a different fingerprint like a change.

use leptos::prelude::*;
use shelf::{Bookmark, BookmarkList, EditState};
use uuid::Uuid;

use crate::services::session::SessionUser;

const STYLE: &str = r"
:root { color-scheme: light dark; font-family: system-ui, sans-serif; }
body { margin: 0 auto; max-width: 44rem; padding: 2rem 1rem; line-height: 1.4; }
header { display: flex; align-items: center; justify-content: space-between; gap: 1rem; }
h1 { margin: 0; font-size: 1.5rem; }
form.inline { display: inline; }
.add { display: grid; grid-template-columns: 1fr 2fr auto; gap: .5rem; margin: 1.5rem 0; }
input { padding: .4rem .5rem; font: inherit; }
button, .button { padding: .4rem .8rem; font: inherit; cursor: pointer; }
.notice { padding: .5rem .75rem; border-radius: .25rem; background: #fff3cd; color: #664d03; }
.notice--error { background: #f8d7da; color: #842029; }
ul.bookmarks { list-style: none; padding: 0; }
.bookmark { display: flex; align-items: baseline; gap: .75rem; padding: .5rem 0; border-bottom: 1px solid #8884; }
.bookmark__main { flex: 1; min-width: 0; }
.bookmark__url { display: block; font-size: .85rem; opacity: .7; overflow-wrap: anywhere; }
.bookmark--editing form { display: flex; flex: 1; gap: .5rem; }
.bookmark--editing input { flex: 1; }
.empty { opacity: .7; }
.landing { text-align: center; padding-top: 4rem; }
";

const LIVE_RELOAD: &str = r#"
(function () {
  var scheme = location.protocol === "https:" ? "wss:" : "ws:";
  var socket = new WebSocket(scheme + "//" + location.host + "/api/ws");
  function refresh() {
    if (document.querySelector("[data-editing]")) {
      var stale = document.getElementById("stale");
      if (stale) { stale.hidden = false; }
      return;
    }
    location.replace("/bookmarks");
  }
  function recheck() {
    var list = document.getElementById("list");
    if (!list) { return; }
    var seen = list.getAttribute("data-fingerprint") || "";
    fetch("/api/bookmarks", { credentials: "same-origin" })
      .then(function (res) { return res.ok ? res.json() : null; })
      .then(function (rows) {
        if (!rows) { return; }
        var now = rows.map(function (r) { return r.id + " " + r.title; }).join("\n");
        if (now !== seen) { refresh(); }
      })
      .catch(function () {});
  }
  socket.onmessage = function (ev) {
    var msg;
    try { msg = JSON.parse(ev.data); } catch (_) { return; }
    if (msg.type === "subscribed") { recheck(); return; }
    if (msg.type === "change") { refresh(); }
  };
})();
"#;

/// The link target for a stored url, or `None` if it is not http(s).
/// Stored urls are free text; anything else renders as plain text.
#[must_use]
pub fn safe_href(url: &str) -> Option<&str> {
    let url = url.trim();
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")).then_some(url)
}

/// Identity of a rendered list: one `<id> <title>` line per row, in display
/// order. The live-reload script builds the same string from the JSON API.
#[must_use]
pub fn list_fingerprint(items: &[Bookmark]) -> String {
    items.iter().map(|row| format!("{} {}", row.id, row.title)).collect::<Vec<_>>().join("\n")
}

/// User-facing text for an `?error=` code.
#[must_use]
pub fn error_message(code: &str) -> &'static str {
    match code {
        "empty_title" => "Title is required.",
        "empty_url" => "URL is required.",
        "not_found" => "That bookmark no longer exists.",
        "store" => "Could not reach the bookmark store. Try again.",
        _ => "Something went wrong.",
    }
}

fn document(title: &str, body: impl IntoView + 'static) -> String {
    let title = title.to_owned();
    let page = view! {
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <title>{title}</title>
                <style inner_html=STYLE></style>
            </head>
            <body>{body}</body>
        </html>
    };
    format!("<!DOCTYPE html>{}", page.to_html())
}

// =============================================================================
// PAGES
// =============================================================================

/// `/`: product blurb and the sign-in button.
#[must_use]
pub fn landing_page(sign_in_enabled: bool) -> String {
    let action = if sign_in_enabled {
        view! { <a class="button" href="/auth/login">"Sign in with Google"</a> }.into_any()
    } else {
        view! { <p class="notice">"Sign-in is not configured on this server."</p> }.into_any()
    };

    document(
        "Linkshelf",
        view! {
            <main class="landing">
                <h1>"Linkshelf"</h1>
                <p>"Private bookmarks, kept in sync across every open tab."</p>
                {action}
            </main>
        },
    )
}

/// `/bookmarks`: header, add form, and the list with at most one row in
/// edit mode.
#[must_use]
pub fn bookmarks_page(user: &SessionUser, list: &BookmarkList) -> String {
    let name = user.name.clone();
    let error = list.error().map(|msg| {
        let msg = msg.to_owned();
        view! { <p class="notice notice--error" role="alert">{msg}</p> }
    });
    let draft_title = list.draft.title.clone();
    let draft_url = list.draft.url.clone();
    let fingerprint = list_fingerprint(list.items());

    let rows = if list.is_empty() {
        view! { <p class="empty">"No bookmarks yet. Add one above."</p> }.into_any()
    } else {
        let editing = list.editing();
        let items = list
            .items()
            .iter()
            .map(|row| match editing.filter(|e| e.id == row.id) {
                Some(edit) => editing_row(edit),
                None => bookmark_row(row),
            })
            .collect_view();
        view! { <ul class="bookmarks">{items}</ul> }.into_any()
    };

    document(
        "Bookmarks · Linkshelf",
        view! {
            <header>
                <h1>"Bookmarks"</h1>
                <form class="inline" method="post" action="/auth/logout">
                    <span>{name}</span>
                    " "
                    <button type="submit">"Sign out"</button>
                </form>
            </header>
            {error}
            <p id="stale" class="notice" hidden=true>"The list changed elsewhere. Finish editing to see it."</p>
            <form class="add" method="post" action="/bookmarks">
                <input name="title" placeholder="Title" required=true value=draft_title />
                <input name="url" type="url" placeholder="https://example.com" required=true value=draft_url />
                <button type="submit">"Add"</button>
            </form>
            <section id="list" data-fingerprint=fingerprint>{rows}</section>
            <script inner_html=LIVE_RELOAD></script>
        },
    )
}

fn rename_action(id: Uuid) -> String {
    format!("/bookmarks/{id}/title")
}

fn bookmark_row(row: &Bookmark) -> AnyView {
    let title = row.title.clone();
    let url = row.url.clone();
    let link = safe_href(&row.url).map(str::to_owned);
    let edit_href = format!("/bookmarks?edit={}", row.id);
    let delete_action = format!("/bookmarks/{}/delete", row.id);

    let label = match link {
        Some(href) => view! {
            <a href=href target="_blank" rel="noopener noreferrer">{title}</a>
        }
        .into_any(),
        None => view! { <span>{title}</span> }.into_any(),
    };

    view! {
        <li class="bookmark" data-id=row.id.to_string()>
            <div class="bookmark__main">
                {label}
                <span class="bookmark__url">{url}</span>
            </div>
            <a href=edit_href>"Edit"</a>
            <form class="inline" method="post" action=delete_action>
                <button type="submit">"Delete"</button>
            </form>
        </li>
    }
    .into_any()
}

fn editing_row(edit: &EditState) -> AnyView {
    let title = edit.title.clone();
    view! {
        <li class="bookmark bookmark--editing" data-id=edit.id.to_string() data-editing="true">
            <form method="post" action=rename_action(edit.id)>
                <input name="title" value=title autofocus=true />
                <button type="submit">"Save"</button>
                <a href="/bookmarks">"Cancel"</a>
            </form>
        </li>
    }
    .into_any()
}

#[cfg(test)]
#[path = "views_test.rs"]
mod tests;
