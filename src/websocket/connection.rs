use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::server::GameServer;

use super::dispatcher::Session;

/// WebSocket handler for `/ws/room/{room_id}`.
///
/// `room_id` is `new` for room creation or an existing 6-character code for
/// join and reconnect; the binding to a player identity happens on the first
/// `create_room` / `join_room` / `reconnect` message.
pub(super) async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<GameServer>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, server, addr, room_id))
}

async fn handle_socket(
    socket: WebSocket,
    server: Arc<GameServer>,
    addr: SocketAddr,
    path_room_id: String,
) {
    let (mut sink, mut stream) = socket.split();
    let queue_capacity = server.config().server.session_queue_capacity.max(1);
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(queue_capacity);

    tracing::info!(client_addr = %addr, %path_room_id, "WebSocket connection established");

    // Writer task: drains the session queue onto the socket. Ends once every
    // sender clone (session + room membership) is gone.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&*message) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(%err, "Failed to serialize outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(server, tx, addr, path_room_id);

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(client_addr = %addr, %err, "WebSocket read error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                // Bad JSON is a protocol error and tears the session down;
                // an unknown `type` tag is dropped silently
                let value: serde_json::Value = match serde_json::from_str(&text) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::warn!(client_addr = %addr, %err, "Malformed frame, closing session");
                        break;
                    }
                };
                match serde_json::from_value::<ClientMessage>(value) {
                    Ok(client_message) => session.dispatch(client_message).await,
                    Err(err) => {
                        tracing::debug!(client_addr = %addr, %err, "Ignoring unrecognized message");
                    }
                }
            }
            Message::Close(_) => break,
            // axum answers pings at the transport layer; binary frames are
            // not part of this protocol
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    session.close().await;
    drop(session);
    let _ = send_task.await;

    tracing::info!(client_addr = %addr, "WebSocket connection closed");
}
