use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{PlayerId, PlayerProfile, ProfileStore, StoreError};

// In-memory profile store; used when no database is configured. Lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    pub profiles: Arc<Mutex<HashMap<PlayerId, PlayerProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerProfile>, StoreError> {
        let profiles = self.profiles.lock().await;
        Ok(profiles.get(&player_id).cloned())
    }

    async fn save(&self, profile: PlayerProfile) -> Result<(), StoreError> {
        let mut profiles = self.profiles.lock().await;
        profiles.insert(profile.account_id, profile);
        Ok(())
    }
}
