// World orchestration: spawning worlds and routing sessions to them.

use super::game::{WorldOutputs, world_task};
use super::profiles::profile_worker;
use super::sessions::SessionRegistry;
use super::types::{Announcement, DirectMessage, GameEvent, ServerState, WorldUpdate};
use crate::domain::{
    GameTuning, PlayerId, ProfileRequest, ProfileStore, StructureListing, WorldConfig, WorldMode,
    WorldState,
};
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock, broadcast, mpsc, watch};
use tracing::info;

/// Shared configuration for spawning worlds.
#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// Capacity for inbound player events.
    pub input_channel_capacity: usize,
    /// Capacity for broadcast world updates and direct messages.
    pub world_broadcast_capacity: usize,
    /// Capacity of each player's action queue.
    pub action_queue_capacity: usize,
    /// Capacity of the per-world profile request queue.
    pub profile_queue_capacity: usize,
    /// Fixed tick interval for the game loop.
    pub tick_interval: Duration,
    /// Gameplay tables shared by every world.
    pub tuning: Arc<GameTuning>,
}

/// Errors returned by world registry operations.
#[derive(Debug, PartialEq, Eq)]
pub enum WorldError {
    /// World already exists and cannot be re-created.
    AlreadyExists,
    /// World id was empty after trimming.
    InvalidId,
}

/// Per-world channels and session ownership.
#[derive(Clone)]
pub struct WorldHandle {
    /// Identifier clients use to target this world.
    pub world_id: Arc<str>,
    pub mode: WorldMode,
    /// Sender for game events into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    /// Broadcast sender for raw world updates.
    pub world_tx: broadcast::Sender<WorldUpdate>,
    /// Broadcast sender for serialized world updates.
    pub world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized world update.
    pub world_latest_tx: watch::Sender<Utf8Bytes>,
    /// Per-player messages; each session keeps only its own.
    pub direct_tx: broadcast::Sender<DirectMessage>,
    /// Full structure grid, refreshed whenever it changes.
    pub structures_tx: watch::Sender<StructureListing>,
    /// Watch sender for world lifecycle changes.
    pub server_state_tx: watch::Sender<ServerState>,
    /// Which connection currently owns each player id.
    pub sessions: Arc<SessionRegistry>,
    shutdown: Arc<Notify>,
}

impl WorldHandle {
    /// Registers a new connection for a player and returns its shutdown signal.
    pub async fn register_or_replace_player_connection(
        &self,
        player_id: PlayerId,
        conn_token: u64,
    ) -> Arc<Notify> {
        self.sessions.register_or_replace(player_id, conn_token).await
    }

    /// Releases the player slot if `conn_token` still owns it.
    pub async fn unregister_player_connection_if_owner(
        &self,
        player_id: PlayerId,
        conn_token: u64,
    ) -> bool {
        self.sessions.unregister_if_owner(player_id, conn_token).await
    }
}

/// Thread-safe registry for active worlds.
pub struct WorldRegistry {
    /// Global settings applied to newly created worlds.
    settings: WorldSettings,
    /// Map of world id to active handle.
    worlds: RwLock<HashMap<String, WorldHandle>>,
    /// Cross-world announcements.
    announcements_tx: broadcast::Sender<Announcement>,
    store: Arc<dyn ProfileStore>,
}

impl WorldRegistry {
    pub fn new(settings: WorldSettings, store: Arc<dyn ProfileStore>) -> Self {
        let (announcements_tx, _) = broadcast::channel(settings.world_broadcast_capacity);
        Self {
            settings,
            worlds: RwLock::new(HashMap::new()),
            announcements_tx,
            store,
        }
    }

    /// Creates a world and spawns its world task and profile worker.
    pub async fn create_world(
        &self,
        world_id: &str,
        mode: WorldMode,
    ) -> Result<WorldHandle, WorldError> {
        let world_id = world_id.trim();
        if world_id.is_empty() {
            return Err(WorldError::InvalidId);
        }

        let mut worlds = self.worlds.write().await;
        if worlds.contains_key(world_id) {
            return Err(WorldError::AlreadyExists);
        }

        let tick_ms = self.settings.tick_interval.as_millis().max(1) as u64;
        let world = WorldState::new(
            WorldConfig {
                mode,
                seed: world_seed(world_id),
                tick_ms,
            },
            self.settings.tuning.clone(),
        );

        // Channel wiring for the world loop.
        let capacity = self.settings.world_broadcast_capacity;
        let (input_tx, input_rx) = mpsc::channel::<GameEvent>(self.settings.input_channel_capacity);
        let (world_tx, _world_rx) = broadcast::channel::<WorldUpdate>(capacity);
        let (world_bytes_tx, _world_bytes_rx) = broadcast::channel::<Utf8Bytes>(capacity);
        let (world_latest_tx, _world_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let (direct_tx, _direct_rx) = broadcast::channel::<DirectMessage>(capacity);
        let (structures_tx, _structures_rx) = watch::channel(world.structure_listing());
        let (server_state_tx, _server_state_rx) = watch::channel(ServerState::Starting);
        let (profile_tx, profile_rx) =
            mpsc::channel::<ProfileRequest>(self.settings.profile_queue_capacity);
        let shutdown = Arc::new(Notify::new());
        let world_id: Arc<str> = Arc::from(world_id);

        tokio::spawn(profile_worker(self.store.clone(), profile_rx, input_tx.clone()));
        tokio::spawn(world_task(
            world_id.clone(),
            world,
            input_rx,
            WorldOutputs {
                world_tx: world_tx.clone(),
                direct_tx: direct_tx.clone(),
                structures_tx: structures_tx.clone(),
                server_state_tx: server_state_tx.clone(),
                announcements_tx: self.announcements_tx.clone(),
                profile_tx,
            },
            self.settings.tick_interval,
            self.settings.action_queue_capacity,
            shutdown.clone(),
        ));

        let handle = WorldHandle {
            world_id: world_id.clone(),
            mode,
            input_tx,
            world_tx,
            world_bytes_tx,
            world_latest_tx,
            direct_tx,
            structures_tx,
            server_state_tx,
            sessions: Arc::new(SessionRegistry::new()),
            shutdown,
        };

        info!(world_id = %world_id, ?mode, "world created");
        worlds.insert(world_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Returns a world handle for the provided id, if it exists.
    pub async fn get_world(&self, world_id: &str) -> Option<WorldHandle> {
        let worlds = self.worlds.read().await;
        worlds.get(world_id).cloned()
    }

    /// Stops a world's task and forgets it. Connected sessions see their channels close.
    pub async fn remove_world(&self, world_id: &str) -> bool {
        let removed = self.worlds.write().await.remove(world_id);
        match removed {
            Some(handle) => {
                handle.shutdown.notify_one();
                info!(world_id, "world removed");
                true
            }
            None => false,
        }
    }

    pub async fn world_ids(&self) -> Vec<String> {
        let worlds = self.worlds.read().await;
        let mut ids: Vec<String> = worlds.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn subscribe_announcements(&self) -> broadcast::Receiver<Announcement> {
        self.announcements_tx.subscribe()
    }
}

// FNV-1a over the id, so a world's RNG stream depends only on its name.
fn world_seed(world_id: &str) -> u64 {
    world_id.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::RecordingStore;

    fn registry() -> WorldRegistry {
        WorldRegistry::new(
            WorldSettings {
                input_channel_capacity: 16,
                world_broadcast_capacity: 16,
                action_queue_capacity: 4,
                profile_queue_capacity: 4,
                tick_interval: Duration::from_millis(10),
                tuning: Arc::new(GameTuning::default()),
            },
            Arc::new(RecordingStore::new()),
        )
    }

    #[tokio::test]
    async fn when_world_id_is_reused_then_creation_fails() {
        let registry = registry();
        registry
            .create_world("alpha", WorldMode::Versus)
            .await
            .expect("first create");
        let second = registry.create_world(" alpha ", WorldMode::Coop).await;
        assert!(matches!(second, Err(WorldError::AlreadyExists)));
    }

    #[tokio::test]
    async fn when_world_id_is_blank_then_creation_fails() {
        let registry = registry();
        let result = registry.create_world("   ", WorldMode::Versus).await;
        assert!(matches!(result, Err(WorldError::InvalidId)));
    }

    #[tokio::test]
    async fn when_world_is_created_then_shop_cells_are_already_listed() {
        let registry = registry();
        let handle = registry
            .create_world("beta", WorldMode::Coop)
            .await
            .expect("create");
        let listing = handle.structures_tx.borrow().clone();
        assert_eq!(
            listing.cells.len(),
            GameTuning::default().structures.shop_cells.len()
        );
        assert!(registry.get_world("beta").await.is_some());
    }

    #[tokio::test]
    async fn when_world_is_removed_then_its_task_reports_stopped() {
        let registry = registry();
        let handle = registry
            .create_world("gamma", WorldMode::Versus)
            .await
            .expect("create");
        let mut state_rx = handle.server_state_tx.subscribe();

        assert!(registry.remove_world("gamma").await);
        tokio::time::timeout(Duration::from_secs(2), async {
            while *state_rx.borrow_and_update() != ServerState::Stopped {
                state_rx.changed().await.expect("state channel open");
            }
        })
        .await
        .expect("world should stop");
        assert!(registry.get_world("gamma").await.is_none());
    }

    #[test]
    fn seeds_differ_per_world_and_are_stable() {
        assert_eq!(world_seed("alpha"), world_seed("alpha"));
        assert_ne!(world_seed("alpha"), world_seed("beta"));
    }
}
