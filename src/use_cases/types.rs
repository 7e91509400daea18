// Use-case level inputs/outputs for the world loop.

use crate::domain::{
    Command, JoinRequest, PlayerId, PlayerInput, PlayerProfile, Rejection, WorldMode,
    WorldSnapshot,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum GameEvent {
    Join(JoinRequest),
    /// `conn_token` guards against a replaced connection removing its successor.
    Leave { player_id: PlayerId, conn_token: u64 },
    Input { player_id: PlayerId, input: PlayerInput },
    /// Malformed input; movement falls back to idle.
    DropInput { player_id: PlayerId },
    Command { player_id: PlayerId, command: Command },
    ProfileLoaded { player_id: PlayerId, profile: PlayerProfile },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerState {
    Starting,
    Running { mode: WorldMode, tick_rate_hz: u32 },
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WorldUpdate {
    pub snapshot: Arc<WorldSnapshot>,
}

/// Message addressed to one player of a world; other sessions drop it.
#[derive(Debug, Clone)]
pub enum DirectMessage {
    Rejected(Rejection),
}

impl DirectMessage {
    pub fn player_id(&self) -> PlayerId {
        match self {
            DirectMessage::Rejected(rejection) => rejection.player_id,
        }
    }
}

/// Server-wide broadcast, delivered to every world.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub world_id: Arc<str>,
    pub text: String,
}
