// Use cases layer: application workflows for the game server.

pub mod command_queue;
pub mod game;
pub mod profiles;
pub mod sessions;
pub mod types;
pub mod world_registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use types::{Announcement, DirectMessage, GameEvent, ServerState, WorldUpdate};
pub use world_registry::{WorldError, WorldHandle, WorldRegistry, WorldSettings};
