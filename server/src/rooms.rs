use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::state::{AppState, Room};

pub fn new_room_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn normalize_room_id(value: &str) -> Option<String> {
    let parsed = Uuid::parse_str(value).ok()?;
    Some(parsed.to_string())
}

/// Registers a peer, creating the room on first join. Returns the room and
/// its peer count. Runs under the registry lock so a join cannot race the
/// removal of an emptied room.
pub async fn join_room(
    state: &AppState,
    room_id: &str,
    peer: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> (Arc<RwLock<Room>>, usize) {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .entry(room_id.to_string())
        .or_insert_with(|| {
            debug!(room = room_id, "creating room");
            Arc::new(RwLock::new(Room::default()))
        })
        .clone();
    let peers = {
        let mut guard = room.write().await;
        guard.peers.insert(peer, tx);
        guard.peers.len()
    };
    (room, peers)
}

/// Unregisters a peer and drops the room once it is empty. Returns the
/// number of peers left.
pub async fn leave_room(
    state: &AppState,
    room_id: &str,
    room: &Arc<RwLock<Room>>,
    peer: Uuid,
) -> usize {
    let mut rooms = state.rooms.write().await;
    let remaining = {
        let mut guard = room.write().await;
        guard.peers.remove(&peer);
        guard.peers.len()
    };
    if remaining == 0 {
        if let Some(current) = rooms.get(room_id) {
            if Arc::ptr_eq(current, room) {
                rooms.remove(room_id);
                debug!(room = room_id, "removed empty room");
            }
        }
    }
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_ids_must_be_uuids() {
        let id = new_room_id();
        assert_eq!(normalize_room_id(&id), Some(id.clone()));
        assert_eq!(normalize_room_id(&id.to_uppercase()), Some(id));
        assert_eq!(normalize_room_id("lobby"), None);
        assert_eq!(normalize_room_id("../etc"), None);
    }

    #[tokio::test]
    async fn rooms_are_shared_and_cleaned_up() {
        let state = AppState::default();
        let (first_peer, second_peer) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx, _rx) = mpsc::unbounded_channel();

        let (first, count) = join_room(&state, "a", first_peer, tx.clone()).await;
        assert_eq!(count, 1);
        let (second, count) = join_room(&state, "a", second_peer, tx).await;
        assert_eq!(count, 2);
        assert!(Arc::ptr_eq(&first, &second));

        assert_eq!(leave_room(&state, "a", &first, first_peer).await, 1);
        assert!(state.rooms.read().await.contains_key("a"));
        assert_eq!(leave_room(&state, "a", &first, second_peer).await, 0);
        assert!(state.rooms.read().await.is_empty());
    }
}
