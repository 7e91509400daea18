use async_trait::async_trait;

use crate::domain::player::{PlayerId, PlayerProfile};

// Failure reported by a profile store adapter.
#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Corrupt(String),
}

// Port for durable player profiles. Called from the profile worker, never from the tick.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerProfile>, StoreError>;
    async fn save(&self, profile: PlayerProfile) -> Result<(), StoreError>;
}
