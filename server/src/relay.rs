use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::state::Room;

/// Forwards `message` to every peer of the room except `sender`. Peers whose
/// channel has closed are dropped from the room. Returns the number of peers
/// the message was handed to.
pub async fn broadcast_except(room: &Arc<RwLock<Room>>, sender: Uuid, message: Message) -> usize {
    let mut stale = Vec::new();
    let mut delivered = 0;
    {
        let room = room.read().await;
        for (id, tx) in room.peers.iter() {
            if *id == sender {
                continue;
            }
            if tx.send(message.clone()).is_err() {
                stale.push(*id);
            } else {
                delivered += 1;
            }
        }
    }

    if !stale.is_empty() {
        let mut room = room.write().await;
        for id in stale {
            room.peers.remove(&id);
        }
    }
    delivered
}
