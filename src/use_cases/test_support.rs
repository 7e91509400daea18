use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::ports::{ProfileStore, StoreError};
use crate::domain::{PlayerId, PlayerProfile};

pub(crate) type ProfileTable = Arc<Mutex<HashMap<PlayerId, PlayerProfile>>>;

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub load: bool,
    pub save: bool,
}

#[derive(Clone)]
pub(crate) struct RecordingStore {
    profiles: ProfileTable,
    failures: FailureFlags,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            profiles: Arc::new(Mutex::new(HashMap::new())),
            failures: FailureFlags::default(),
        }
    }

    pub(crate) fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn insert_test_profile(&self, profile: PlayerProfile) {
        let mut guard = self.profiles.lock().expect("profiles mutex poisoned");
        guard.insert(profile.account_id, profile);
    }

    pub(crate) fn get_test_profile(&self, player_id: PlayerId) -> Option<PlayerProfile> {
        let guard = self.profiles.lock().expect("profiles mutex poisoned");
        guard.get(&player_id).cloned()
    }
}

#[async_trait]
impl ProfileStore for RecordingStore {
    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerProfile>, StoreError> {
        if self.failures.load {
            return Err(StoreError::Unavailable("load failed".to_string()));
        }

        let guard = self.profiles.lock().expect("profiles mutex poisoned");
        Ok(guard.get(&player_id).cloned())
    }

    async fn save(&self, profile: PlayerProfile) -> Result<(), StoreError> {
        if self.failures.save {
            return Err(StoreError::Unavailable("save failed".to_string()));
        }

        let mut guard = self.profiles.lock().expect("profiles mutex poisoned");
        guard.insert(profile.account_id, profile);
        Ok(())
    }
}
