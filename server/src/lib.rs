use std::path::PathBuf;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

pub mod handlers;
pub mod relay;
pub mod rooms;
pub mod state;

use crate::handlers::{lobby_ws_handler, ping_handler, room_page_handler, root_handler, ws_handler};
pub use crate::state::{AppState, DEFAULT_MAX_FRAME_BYTES};

pub fn build_router(state: AppState, public_dir: PathBuf) -> Router {
    let index_file = public_dir.join("index.html");
    Router::new()
        .route("/", get(root_handler))
        .route("/ping", get(ping_handler))
        .route("/s/:room_id", get(room_page_handler))
        .route("/ws", get(lobby_ws_handler))
        .route("/ws/:room_id", get(ws_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(axum::Extension(index_file))
        .with_state(state)
}
