// Discrete facts emitted by a tick, delivered alongside the snapshot.

use crate::domain::errors::RejectReason;
use crate::domain::hostile::HostileId;
use crate::domain::player::{PartyId, PlayerId, Role};
use crate::domain::projectile::ProjectileId;
use crate::domain::spatial::TargetRef;
use crate::domain::structures::TileKey;
use crate::domain::weapon::WeaponKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireReason {
    Expired,
    OutOfBounds,
    HitGround,
    HitPlayer,
    HitHostile,
    HitStructure,
    /// Removed at the owner's request.
    Retired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    PlayerJoined {
        player_id: PlayerId,
        display_name: String,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    ProjectileSpawned {
        id: ProjectileId,
        owner: PlayerId,
        weapon: WeaponKind,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        client_shot_id: Option<u32>,
    },
    ProjectileRetired {
        id: ProjectileId,
        reason: RetireReason,
    },
    Hit {
        target: TargetRef,
        attacker: Option<PlayerId>,
        damage: f32,
        headshot: bool,
        splash: bool,
    },
    Killed {
        victim: TargetRef,
        killer: Option<PlayerId>,
    },
    Explosion {
        x: f32,
        y: f32,
        radius: f32,
    },
    Downed {
        player_id: PlayerId,
    },
    ReviveStarted {
        player_id: PlayerId,
        reviver: PlayerId,
    },
    ReviveCancelled {
        player_id: PlayerId,
        reviver: PlayerId,
    },
    Revived {
        player_id: PlayerId,
        reviver: PlayerId,
    },
    Eliminated {
        player_id: PlayerId,
    },
    Respawned {
        player_id: PlayerId,
    },
    StructureDamaged {
        key: TileKey,
        hp: f32,
    },
    StructureDestroyed {
        key: TileKey,
    },
    GridReset {
        removed: usize,
    },
    HostileSpawned {
        id: HostileId,
        party: PartyId,
    },
    WaveStarted {
        party: PartyId,
        wave: u32,
    },
    WaveCleared {
        party: PartyId,
        wave: u32,
    },
    WaveRestarted {
        party: PartyId,
        wave: u32,
    },
    GameOver {
        party: PartyId,
        wave: u32,
        score: u64,
    },
    RoleChanged {
        player_id: PlayerId,
        role: Role,
    },
    WeaponLevelChanged {
        player_id: PlayerId,
        weapon: WeaponKind,
        level: u8,
    },
    Chat {
        player_id: PlayerId,
        text: String,
    },
}

/// Which client action a rejection answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fire,
    RetireProjectile,
    Reload,
    SwitchWeapon,
    PlaceStructure,
    DeleteStructure,
    Party,
    Chat,
    Command,
}

/// Rejection addressed to a single player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub player_id: PlayerId,
    pub action: ActionKind,
    pub reason: RejectReason,
}
