use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::relay::broadcast_except;
use crate::rooms::{join_room, leave_room, new_room_id, normalize_room_id};
use crate::state::{AppState, LOBBY_ROOM};

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn root_handler() -> impl IntoResponse {
    let room_id = new_room_id();
    Redirect::to(&format!("/s/{room_id}"))
}

pub async fn room_page_handler(
    Path(room_id): Path<String>,
    axum::Extension(index_file): axum::Extension<std::path::PathBuf>,
) -> impl IntoResponse {
    if normalize_room_id(&room_id).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::read_to_string(&index_file).await {
        Ok(contents) => Html(contents).into_response(),
        Err(error) => {
            warn!(path = %index_file.display(), %error, "failed to read index page");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn lobby_ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade(ws, state, LOBBY_ROOM.to_string())
}

pub async fn ws_handler(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let room_id = match normalize_room_id(&room_id) {
        Some(id) => id,
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    upgrade(ws, state, room_id).into_response()
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, room_id: String) -> axum::response::Response {
    ws.max_message_size(state.max_frame_bytes)
        .max_frame_size(state.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, room_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, room_id: String) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = Uuid::new_v4();

    let (room, peers) = join_room(&state, &room_id, connection_id, tx).await;
    info!(room = %room_id, conn = %connection_id, peers, "WS connected");

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if socket_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut close_frame = None;
    while let Some(Ok(message)) = socket_receiver.next().await {
        match message {
            Message::Text(_) | Message::Binary(_) => {
                let delivered = broadcast_except(&room, connection_id, message).await;
                debug!(room = %room_id, conn = %connection_id, delivered, "relayed frame");
            }
            Message::Close(frame) => {
                close_frame = frame;
                break;
            }
            _ => {}
        }
    }

    let peers = leave_room(&state, &room_id, &room, connection_id).await;
    info!(room = %room_id, conn = %connection_id, peers, "WS disconnected");
    if let Some(frame) = &close_frame {
        debug!(
            room = %room_id,
            conn = %connection_id,
            code = frame.code,
            reason = %frame.reason,
            "WS close frame"
        );
    }
    send_task.abort();
}
