//! WebSocket handler: one-way relay of the caller's bookmark changes.
//!
//! DESIGN
//! ======
//! The socket is authenticated by the session cookie at upgrade time. Each
//! connection owns exactly one `Subscription` and runs one `select!` loop:
//! - change events for this user → forward as `StreamMessage::Change`
//! - inbound close / error → stop
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → subscribe (`Subscribing`) → send `{"type":"subscribed"}` → `Subscribed`
//! 2. Forward each change in arrival order
//! 3. Client close, send failure, or subscription error → release and exit
//!
//! Inbound text is ignored; the socket carries no requests.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use shelf::StreamMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::realtime::ChangeHub;
use crate::state::AppState;

/// `GET /api/ws`: `401` before upgrade when signed out.
pub async fn handle_ws(State(state): State<AppState>, auth: AuthUser, ws: WebSocketUpgrade) -> Response {
    let user_id = auth.user.id;
    ws.on_upgrade(move |socket| run_ws(socket, state.hub, user_id))
}

async fn run_ws(mut socket: WebSocket, hub: ChangeHub, user_id: Uuid) {
    let mut subscription = hub.subscribe(user_id);
    if send_message(&mut socket, &StreamMessage::Subscribed { user_id }).await.is_err() {
        subscription.release();
        return;
    }
    subscription.confirm();
    info!(%user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            event = subscription.next() => {
                let Some(event) = event else {
                    warn!(%user_id, state = %subscription.state(), "ws: subscription ended");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                debug!(%user_id, kind = %event.kind(), id = %event.id(), "ws: forward change");
                if send_message(&mut socket, &StreamMessage::Change { event }).await.is_err() {
                    break;
                }
            }
        }
    }

    subscription.release();
    info!(%user_id, "ws: client disconnected");
}

async fn send_message(socket: &mut WebSocket, message: &StreamMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
