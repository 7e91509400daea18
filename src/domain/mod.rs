// Domain layer: core simulation types and rules.

pub mod combat;
pub mod commands;
pub mod errors;
pub mod events;
pub mod hostile;
pub mod party;
pub mod player;
pub mod ports;
pub mod projectile;
pub mod snapshot;
pub mod spatial;
pub mod structures;
pub mod tuning;
pub mod weapon;
pub mod world;

pub use commands::{Command, PartyCommand};
pub use errors::RejectReason;
pub use events::{ActionKind, Rejection, WorldEvent};
pub use player::{PartyId, PlayerId, PlayerInput, PlayerProfile, Role};
pub use ports::{ProfileStore, StoreError};
pub use snapshot::{StructureListing, WorldSnapshot};
pub use tuning::GameTuning;
pub use world::{JoinRequest, ProfileRequest, TickOutput, WorldConfig, WorldMode, WorldState};
