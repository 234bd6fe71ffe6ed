use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub const LOBBY_ROOM: &str = "lobby";
pub const DEFAULT_MAX_FRAME_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, Arc<RwLock<Room>>>>>,
    pub max_frame_bytes: usize,
}

impl AppState {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            max_frame_bytes,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

/// Connected peers of one board. The relay keeps no canvas state.
#[derive(Default)]
pub struct Room {
    pub peers: HashMap<Uuid, mpsc::UnboundedSender<Message>>,
}
