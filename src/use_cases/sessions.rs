// Connection ownership per player: the newest connection for an account wins.

use crate::domain::PlayerId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[derive(Debug)]
struct SessionSlot {
    conn_token: u64,
    // Fired when a newer connection takes over this slot.
    shutdown: Arc<Notify>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<PlayerId, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `player_id`, signalling any previous owner to close.
    pub async fn register_or_replace(&self, player_id: PlayerId, conn_token: u64) -> Arc<Notify> {
        let shutdown = Arc::new(Notify::new());
        let mut slots = self.slots.lock().await;
        let previous = slots.insert(
            player_id,
            SessionSlot {
                conn_token,
                shutdown: shutdown.clone(),
            },
        );
        if let Some(previous) = previous {
            // notify_one keeps a permit if the old loop is not parked in select yet.
            previous.shutdown.notify_one();
        }
        shutdown
    }

    /// Releases the slot only if `conn_token` still owns it.
    pub async fn unregister_if_owner(&self, player_id: PlayerId, conn_token: u64) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.get(&player_id) {
            Some(slot) if slot.conn_token == conn_token => {
                slots.remove(&player_id);
                true
            }
            _ => false,
        }
    }

    pub async fn owner_token(&self, player_id: PlayerId) -> Option<u64> {
        self.slots.lock().await.get(&player_id).map(|s| s.conn_token)
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
