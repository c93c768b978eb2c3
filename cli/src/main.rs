use std::fmt::Write as _;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde_json::Value;
use shelf::{Bookmark, BookmarkList, EditCommit, EditState, NewBookmark, StreamMessage, SubscriptionState};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use uuid::Uuid;

const SESSION_COOKIE: &str = "session_token";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; pass --session-token or set LINKSHELF_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for subscription")]
    Timeout,
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("{0}")]
    Validation(#[from] shelf::ValidationError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "linkshelf", about = "Linkshelf bookmark CLI")]
struct Cli {
    #[arg(long, env = "LINKSHELF_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Value of the `session_token` cookie from a signed-in browser.
    #[arg(long, env = "LINKSHELF_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    session_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Print your bookmarks, newest first.
    List,
    Add {
        title: String,
        url: String,
    },
    /// Rename a bookmark. A blank title changes nothing.
    Edit {
        id: Uuid,
        title: String,
    },
    Delete {
        id: Uuid,
    },
    /// Hold a realtime subscription and redraw the list on every change.
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext {
        base_url: cli.base_url,
        session_token: cli.session_token,
    };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::List => run_list(&ctx).await,
        Command::Add { title, url } => run_add(&ctx, &title, &url).await,
        Command::Edit { id, title } => run_edit(&ctx, id, &title).await,
        Command::Delete { id } => run_delete(&ctx, id).await,
        Command::Watch => run_watch(&ctx).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", cli.base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            status: status.as_u16(),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_list(cli: &CliContext) -> Result<(), CliError> {
    let list = BookmarkList::from_items(fetch_bookmarks(cli).await?);
    print!("{}", render_list(&list, None));
    Ok(())
}

async fn run_add(cli: &CliContext, title: &str, url: &str) -> Result<(), CliError> {
    // Rejected locally so a bad row never reaches the server.
    let draft = NewBookmark::new(title, url)?;
    let body = serde_json::json!({ "title": draft.title(), "url": draft.url() });
    let json = api_request(cli, reqwest::Method::POST, "/api/bookmarks", Some(body)).await?;
    print_json(&json)
}

async fn run_edit(cli: &CliContext, id: Uuid, title: &str) -> Result<(), CliError> {
    let EditCommit::Save { id, title } = (EditState { id, title: title.to_owned() }).into_commit() else {
        eprintln!("empty title; bookmark {id} unchanged");
        return Ok(());
    };
    let path = format!("/api/bookmarks/{id}");
    let body = serde_json::json!({ "title": title });
    let json = api_request(cli, reqwest::Method::PATCH, &path, Some(body)).await?;
    print_json(&json)
}

async fn run_delete(cli: &CliContext, id: Uuid) -> Result<(), CliError> {
    let path = format!("/api/bookmarks/{id}");
    api_request(cli, reqwest::Method::DELETE, &path, None).await?;
    println!("deleted {id}");
    Ok(())
}

// =============================================================================
// WATCH
// =============================================================================

async fn run_watch(cli: &CliContext) -> Result<(), CliError> {
    let state = SubscriptionState::Subscribing;
    let request = ws_request(cli)?;
    let (mut stream, _) = connect_async(request)
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;

    // Subscribe before loading so no change between the two is missed.
    wait_for_subscribed(&mut stream).await?;
    let state = advance(state, SubscriptionState::Subscribed);

    let mut list = BookmarkList::from_items(fetch_bookmarks(cli).await?);
    print!("{}", render_list(&list, Some(state)));

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => match apply_message(&mut list, text.as_str()) {
                        Ok(true) => print!("{}", render_list(&list, Some(state))),
                        Ok(false) => {}
                        Err(error) => break Err(error),
                    },
                    Some(Ok(Message::Close(_))) | None => break Err(CliError::WsClosed),
                    Some(Ok(_)) => {}
                    Some(Err(error)) => break Err(CliError::WsConnect(Box::new(error))),
                }
            }
        }
    };

    match outcome {
        Ok(()) => {
            let _ = stream.close(None).await;
            advance(state, SubscriptionState::Unsubscribed);
            Ok(())
        }
        Err(error) => {
            // No reconnect: the watcher stops and reports the failure.
            advance(state, SubscriptionState::Error);
            Err(error)
        }
    }
}

fn advance(from: SubscriptionState, to: SubscriptionState) -> SubscriptionState {
    if from != to {
        eprintln!("subscription {from} -> {to}");
    }
    to
}

async fn wait_for_subscribed(
    stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Result<(), CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            match message.map_err(|error| CliError::WsConnect(Box::new(error)))? {
                Message::Text(text) => {
                    if let StreamMessage::Subscribed { .. } = serde_json::from_str(text.as_str())? {
                        return Ok(());
                    }
                }
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };

    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .map_err(|_| CliError::Timeout)?
}

/// Fold one socket message into the list. Returns whether the list changed.
fn apply_message(list: &mut BookmarkList, text: &str) -> Result<bool, CliError> {
    match serde_json::from_str::<StreamMessage>(text)? {
        StreamMessage::Subscribed { .. } => Ok(false),
        StreamMessage::Change { event } => {
            list.apply(event);
            Ok(true)
        }
    }
}

fn render_list(list: &BookmarkList, state: Option<SubscriptionState>) -> String {
    let mut out = String::new();
    match state {
        Some(state) => {
            let _ = writeln!(out, "== {} bookmark(s) [{state}] ==", list.len());
        }
        None => {
            let _ = writeln!(out, "== {} bookmark(s) ==", list.len());
        }
    }
    if let Some(error) = list.error() {
        let _ = writeln!(out, "! {error}");
    }
    if list.is_empty() {
        out.push_str("No bookmarks yet.\n");
    }
    for bookmark in list.items() {
        let _ = writeln!(out, "{}  {}  {}", bookmark.id, bookmark.title, bookmark.url);
    }
    out
}

// =============================================================================
// TRANSPORT
// =============================================================================

async fn fetch_bookmarks(cli: &CliContext) -> Result<Vec<Bookmark>, CliError> {
    let json = api_request(cli, reqwest::Method::GET, "/api/bookmarks", None).await?;
    Ok(serde_json::from_value(json)?)
}

fn session_cookie(cli: &CliContext) -> Result<HeaderValue, CliError> {
    let session_token = cli
        .session_token
        .as_deref()
        .ok_or(CliError::MissingSessionToken)?;
    Ok(HeaderValue::from_str(&format!("{SESSION_COOKIE}={session_token}"))?)
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, session_cookie(cli)?);

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;
    let url = format!("{}{}", cli.base_url.trim_end_matches('/'), path);

    let request = client.request(method, &url);
    let request = if let Some(json) = body {
        request.json(&json)
    } else {
        request
    };

    let response = request.send().await?;
    let status = response.status();
    let value = response
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError {
            status: status.as_u16(),
            message: value.to_string(),
        });
    }

    Ok(value)
}

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

fn ws_request(
    cli: &CliContext,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, CliError> {
    let mut request = ws_url(&cli.base_url)?
        .into_client_request()
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;
    request.headers_mut().insert(COOKIE, session_cookie(cli)?);
    Ok(request)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    if value.is_null() {
        println!("unchanged");
        return Ok(());
    }
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
