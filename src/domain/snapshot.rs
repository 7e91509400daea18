// Read-only per-tick projection of the world. Rebuilt every tick, never patched.

use crate::domain::events::WorldEvent;
use crate::domain::hostile::HostileId;
use crate::domain::party::PartyPhase;
use crate::domain::player::{PartyId, PlayerId, Role};
use crate::domain::projectile::ProjectileId;
use crate::domain::structures::{StructureDiff, StructureKind, TileKey};
use crate::domain::weapon::WeaponKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifeView {
    Alive,
    Downed { bleed_out_at: u64, revive_progress: f32 },
    Eliminated { respawn_at: Option<u64> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponView {
    pub kind: WeaponKind,
    pub level: u8,
    pub ammo: u32,
    pub magazine: u32,
    pub reloading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub role: Role,
    pub life: LifeView,
    pub weapon: Option<WeaponView>,
    pub shielded: bool,
    pub party: Option<PartyId>,
    pub kills: u64,
    pub deaths: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: ProjectileId,
    pub owner: Option<PlayerId>,
    pub weapon: WeaponKind,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostileSnapshot {
    pub id: HostileId,
    pub party: PartyId,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartySnapshot {
    pub id: PartyId,
    pub leader: PlayerId,
    pub members: Vec<PlayerId>,
    pub open: bool,
    pub team_lives: u32,
    pub phase: PartyPhase,
    pub score: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureSnapshot {
    pub key: TileKey,
    pub kind: StructureKind,
    pub owner: Option<PlayerId>,
    pub hp: f32,
}

/// Full structure list, sent on join and lag recovery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureListing {
    pub revision: u64,
    pub cells: Vec<StructureSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub time_ms: u64,
    pub players: Vec<PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub hostiles: Vec<HostileSnapshot>,
    pub parties: Vec<PartySnapshot>,
    /// Present only on ticks where the grid changed.
    pub structures: Option<StructureDiff>,
    pub events: Vec<WorldEvent>,
}
