// Wire protocol DTOs and conversions for public game server messages.
// Internal service-to-service DTOs should live outside this module.

use crate::domain::events::RetireReason;
use crate::domain::party::PartyPhase;
use crate::domain::snapshot::{
    HostileSnapshot, LifeView, PartySnapshot, PlayerSnapshot, ProjectileSnapshot,
    StructureSnapshot, WeaponView,
};
use crate::domain::spatial::TargetRef;
use crate::domain::structures::{StructureChange, StructureDiff, StructureKind, TileKey};
use crate::domain::weapon::WeaponKind;
use crate::domain::{
    ActionKind, Command, PartyCommand, PlayerInput, RejectReason, Rejection, Role,
    StructureListing, WorldEvent, WorldMode,
};
use crate::use_cases::{Announcement, ServerState, WorldUpdate};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity for the connection after Join is accepted.
    Identity { player_id: String },
    // Snapshot of the world for a given tick, with that tick's events.
    WorldUpdate(WorldUpdateDto),
    // Full structure grid; sent on join and after lag recovery.
    Structures(StructureListingDto),
    // World lifecycle transitions.
    GameState(ServerStateDto),
    // Answer to an action that did not change state. Only sent to its issuer.
    Rejected {
        action: ActionKind,
        reason: RejectReason,
        message: String,
    },
    Announcement { world_id: String, text: String },
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message carrying the auth session token.
    Join(JoinPayload),
    // Latest movement and aim; replaces the previous value.
    Input(PlayerInputDto),
    Fire(FirePayload),
    Reload,
    SwitchWeapon { slot: usize },
    PlaceStructure(PlacePayload),
    DeleteStructure(TilePayload),
    RetireProjectile { id: u32 },
    Party(PartyPayload),
    Chat { text: String },
}

/// Payload for the Join handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub session_token: String,
}

/// Movement and aim sent by the client after joining.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlayerInputDto {
    #[serde(default)]
    pub move_x: f32,
    #[serde(default)]
    pub move_y: f32,
    #[serde(default)]
    pub aim_x: f32,
    #[serde(default)]
    pub aim_y: f32,
}

impl From<PlayerInputDto> for PlayerInput {
    fn from(input: PlayerInputDto) -> Self {
        Self {
            move_x: input.move_x,
            move_y: input.move_y,
            aim_x: input.aim_x,
            aim_y: input.aim_y,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FirePayload {
    pub angle: f32,
    #[serde(default)]
    pub client_shot_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlacePayload {
    pub kind: StructureKind,
    pub tile_x: i32,
    pub tile_y: i32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TilePayload {
    pub tile_x: i32,
    pub tile_y: i32,
}

/// Party management; `action` selects the operation.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PartyPayload {
    Create,
    Join { party_id: u32 },
    Leave,
    SetOpen { open: bool },
    StartRun,
    Disband,
}

impl From<PartyPayload> for PartyCommand {
    fn from(payload: PartyPayload) -> Self {
        match payload {
            PartyPayload::Create => PartyCommand::Create,
            PartyPayload::Join { party_id } => PartyCommand::Join { party_id },
            PartyPayload::Leave => PartyCommand::Leave,
            PartyPayload::SetOpen { open } => PartyCommand::SetOpen { open },
            PartyPayload::StartRun => PartyCommand::StartRun,
            PartyPayload::Disband => PartyCommand::Disband,
        }
    }
}

/// How the session loop should treat a parsed client message.
#[derive(Debug, Clone)]
pub enum Inbound {
    Join,
    Input(PlayerInput),
    Command(Command),
}

impl From<ClientMessage> for Inbound {
    fn from(message: ClientMessage) -> Self {
        let command = match message {
            ClientMessage::Join(_) => return Inbound::Join,
            ClientMessage::Input(input) => return Inbound::Input(input.into()),
            ClientMessage::Fire(fire) => Command::Fire {
                angle: fire.angle,
                client_shot_id: fire.client_shot_id,
            },
            ClientMessage::Reload => Command::Reload,
            ClientMessage::SwitchWeapon { slot } => Command::SwitchWeapon { slot },
            ClientMessage::PlaceStructure(place) => Command::PlaceStructure {
                kind: place.kind,
                key: TileKey {
                    x: place.tile_x,
                    y: place.tile_y,
                },
            },
            ClientMessage::DeleteStructure(tile) => Command::DeleteStructure {
                key: TileKey {
                    x: tile.tile_x,
                    y: tile.tile_y,
                },
            },
            ClientMessage::RetireProjectile { id } => Command::RetireProjectile { id },
            ClientMessage::Party(payload) => Command::Party(payload.into()),
            ClientMessage::Chat { text } => Command::Chat { text },
        };
        Inbound::Command(command)
    }
}

impl From<Rejection> for ServerMessage {
    fn from(rejection: Rejection) -> Self {
        ServerMessage::Rejected {
            action: rejection.action,
            reason: rejection.reason,
            message: rejection.reason.message().to_string(),
        }
    }
}

impl From<Announcement> for ServerMessage {
    fn from(announcement: Announcement) -> Self {
        ServerMessage::Announcement {
            world_id: announcement.world_id.to_string(),
            text: announcement.text,
        }
    }
}

/// Snapshot of the world sent to clients on each tick.
#[derive(Debug, Clone, Serialize)]
pub struct WorldUpdateDto {
    pub tick: u64,
    pub time_ms: u64,
    pub players: Vec<PlayerStateDto>,
    pub projectiles: Vec<ProjectileStateDto>,
    pub hostiles: Vec<HostileStateDto>,
    pub parties: Vec<PartyStateDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structures: Option<StructureDiffDto>,
    pub events: Vec<EventDto>,
}

impl From<WorldUpdate> for WorldUpdateDto {
    fn from(update: WorldUpdate) -> Self {
        let snapshot = update.snapshot;
        Self {
            tick: snapshot.tick,
            time_ms: snapshot.time_ms,
            players: snapshot.players.iter().map(PlayerStateDto::from).collect(),
            projectiles: snapshot
                .projectiles
                .iter()
                .map(ProjectileStateDto::from)
                .collect(),
            hostiles: snapshot.hostiles.iter().map(HostileStateDto::from).collect(),
            parties: snapshot.parties.iter().map(PartyStateDto::from).collect(),
            structures: snapshot.structures.as_ref().map(StructureDiffDto::from),
            events: snapshot.events.iter().map(EventDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerStateDto {
    pub id: String,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub role: Role,
    pub life: LifeDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<WeaponStateDto>,
    pub shielded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_id: Option<u32>,
    pub kills: u64,
    pub deaths: u64,
}

impl From<&PlayerSnapshot> for PlayerStateDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            id: player.id.to_string(),
            display_name: player.display_name.clone(),
            x: player.x,
            y: player.y,
            vx: player.vx,
            vy: player.vy,
            hp: player.hp,
            max_hp: player.max_hp,
            role: player.role,
            life: player.life.into(),
            weapon: player.weapon.map(WeaponStateDto::from),
            shielded: player.shielded,
            party_id: player.party,
            kills: player.kills,
            deaths: player.deaths,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifeDto {
    Alive,
    Downed {
        bleed_out_at: u64,
        revive_progress: f32,
    },
    Eliminated {
        #[serde(skip_serializing_if = "Option::is_none")]
        respawn_at: Option<u64>,
    },
}

impl From<LifeView> for LifeDto {
    fn from(life: LifeView) -> Self {
        match life {
            LifeView::Alive => LifeDto::Alive,
            LifeView::Downed {
                bleed_out_at,
                revive_progress,
            } => LifeDto::Downed {
                bleed_out_at,
                revive_progress,
            },
            LifeView::Eliminated { respawn_at } => LifeDto::Eliminated { respawn_at },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WeaponStateDto {
    pub kind: WeaponKind,
    pub level: u8,
    pub ammo: u32,
    pub magazine: u32,
    pub reloading: bool,
}

impl From<WeaponView> for WeaponStateDto {
    fn from(weapon: WeaponView) -> Self {
        Self {
            kind: weapon.kind,
            level: weapon.level,
            ammo: weapon.ammo,
            magazine: weapon.magazine,
            reloading: weapon.reloading,
        }
    }
}

/// Flattened projectile state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectileStateDto {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub weapon: WeaponKind,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
}

impl From<&ProjectileSnapshot> for ProjectileStateDto {
    fn from(projectile: &ProjectileSnapshot) -> Self {
        Self {
            id: projectile.id,
            owner_id: projectile.owner.map(|owner| owner.to_string()),
            weapon: projectile.weapon,
            x: projectile.x,
            y: projectile.y,
            rot: projectile.rot,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct HostileStateDto {
    pub id: u32,
    pub party_id: u32,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
}

impl From<&HostileSnapshot> for HostileStateDto {
    fn from(hostile: &HostileSnapshot) -> Self {
        Self {
            id: hostile.id,
            party_id: hostile.party,
            x: hostile.x,
            y: hostile.y,
            hp: hostile.hp,
            max_hp: hostile.max_hp,
        }
    }
}

/// Party HUD row.
#[derive(Debug, Clone, Serialize)]
pub struct PartyStateDto {
    pub id: u32,
    pub leader_id: String,
    pub members: Vec<String>,
    pub open: bool,
    pub team_lives: u32,
    pub phase: PartyPhaseDto,
    pub wave: u32,
    pub score: u64,
}

impl From<&PartySnapshot> for PartyStateDto {
    fn from(party: &PartySnapshot) -> Self {
        Self {
            id: party.id,
            leader_id: party.leader.to_string(),
            members: party.members.iter().map(u64::to_string).collect(),
            open: party.open,
            team_lives: party.team_lives,
            phase: party.phase.into(),
            wave: party.phase.wave(),
            score: party.score,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum PartyPhaseDto {
    Lobby,
    Countdown { starts_at: u64 },
    WaveActive,
    WaveCompleted { next_at: u64 },
    GameOver,
}

impl From<PartyPhase> for PartyPhaseDto {
    fn from(phase: PartyPhase) -> Self {
        match phase {
            PartyPhase::Lobby => PartyPhaseDto::Lobby,
            PartyPhase::Countdown { starts_at, .. } => PartyPhaseDto::Countdown { starts_at },
            PartyPhase::WaveActive { .. } => PartyPhaseDto::WaveActive,
            PartyPhase::WaveCompleted { next_at, .. } => PartyPhaseDto::WaveCompleted { next_at },
            PartyPhase::GameOver { .. } => PartyPhaseDto::GameOver,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureStateDto {
    pub tile_x: i32,
    pub tile_y: i32,
    pub kind: StructureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    // Shop cells have infinite hp; JSON has no representation for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<f32>,
}

impl From<&StructureSnapshot> for StructureStateDto {
    fn from(cell: &StructureSnapshot) -> Self {
        Self {
            tile_x: cell.key.x,
            tile_y: cell.key.y,
            kind: cell.kind,
            owner_id: cell.owner.map(|owner| owner.to_string()),
            hp: cell.hp.is_finite().then_some(cell.hp),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureListingDto {
    pub revision: u64,
    pub cells: Vec<StructureStateDto>,
}

impl From<&StructureListing> for StructureListingDto {
    fn from(listing: &StructureListing) -> Self {
        Self {
            revision: listing.revision,
            cells: listing.cells.iter().map(StructureStateDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureDiffDto {
    pub revision: u64,
    pub changes: Vec<StructureChangeDto>,
}

impl From<&StructureDiff> for StructureDiffDto {
    fn from(diff: &StructureDiff) -> Self {
        Self {
            revision: diff.revision,
            changes: diff.changes.iter().copied().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StructureChangeDto {
    Placed {
        tile_x: i32,
        tile_y: i32,
        kind: StructureKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        owner_id: Option<String>,
    },
    Damaged {
        tile_x: i32,
        tile_y: i32,
        hp: f32,
    },
    Removed {
        tile_x: i32,
        tile_y: i32,
    },
}

impl From<StructureChange> for StructureChangeDto {
    fn from(change: StructureChange) -> Self {
        match change {
            StructureChange::Placed { key, kind, owner } => StructureChangeDto::Placed {
                tile_x: key.x,
                tile_y: key.y,
                kind,
                owner_id: owner.map(|owner| owner.to_string()),
            },
            StructureChange::Damaged { key, hp } => StructureChangeDto::Damaged {
                tile_x: key.x,
                tile_y: key.y,
                hp,
            },
            StructureChange::Removed { key } => StructureChangeDto::Removed {
                tile_x: key.x,
                tile_y: key.y,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetDto {
    Player { id: String },
    Hostile { id: u32 },
}

impl From<TargetRef> for TargetDto {
    fn from(target: TargetRef) -> Self {
        match target {
            TargetRef::Player(id) => TargetDto::Player { id: id.to_string() },
            TargetRef::Hostile(id) => TargetDto::Hostile { id },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireReasonDto {
    Expired,
    OutOfBounds,
    HitGround,
    HitPlayer,
    HitHostile,
    HitStructure,
    Retired,
}

impl From<RetireReason> for RetireReasonDto {
    fn from(reason: RetireReason) -> Self {
        match reason {
            RetireReason::Expired => RetireReasonDto::Expired,
            RetireReason::OutOfBounds => RetireReasonDto::OutOfBounds,
            RetireReason::HitGround => RetireReasonDto::HitGround,
            RetireReason::HitPlayer => RetireReasonDto::HitPlayer,
            RetireReason::HitHostile => RetireReasonDto::HitHostile,
            RetireReason::HitStructure => RetireReasonDto::HitStructure,
            RetireReason::Retired => RetireReasonDto::Retired,
        }
    }
}

/// Discrete world event, tagged by `event`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventDto {
    PlayerJoined {
        player_id: String,
        display_name: String,
    },
    PlayerLeft {
        player_id: String,
    },
    ProjectileSpawned {
        id: u32,
        owner_id: String,
        weapon: WeaponKind,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_shot_id: Option<u32>,
    },
    ProjectileRetired {
        id: u32,
        reason: RetireReasonDto,
    },
    Hit {
        target: TargetDto,
        #[serde(skip_serializing_if = "Option::is_none")]
        attacker_id: Option<String>,
        damage: f32,
        headshot: bool,
        splash: bool,
    },
    Killed {
        victim: TargetDto,
        #[serde(skip_serializing_if = "Option::is_none")]
        killer_id: Option<String>,
    },
    Explosion {
        x: f32,
        y: f32,
        radius: f32,
    },
    Downed {
        player_id: String,
    },
    ReviveStarted {
        player_id: String,
        reviver_id: String,
    },
    ReviveCancelled {
        player_id: String,
        reviver_id: String,
    },
    Revived {
        player_id: String,
        reviver_id: String,
    },
    Eliminated {
        player_id: String,
    },
    Respawned {
        player_id: String,
    },
    StructureDamaged {
        tile_x: i32,
        tile_y: i32,
        hp: f32,
    },
    StructureDestroyed {
        tile_x: i32,
        tile_y: i32,
    },
    GridReset {
        removed: usize,
    },
    HostileSpawned {
        id: u32,
        party_id: u32,
    },
    WaveStarted {
        party_id: u32,
        wave: u32,
    },
    WaveCleared {
        party_id: u32,
        wave: u32,
    },
    WaveRestarted {
        party_id: u32,
        wave: u32,
    },
    GameOver {
        party_id: u32,
        wave: u32,
        score: u64,
    },
    RoleChanged {
        player_id: String,
        role: Role,
    },
    WeaponLevelChanged {
        player_id: String,
        weapon: WeaponKind,
        level: u8,
    },
    Chat {
        player_id: String,
        text: String,
    },
}

impl From<&WorldEvent> for EventDto {
    fn from(event: &WorldEvent) -> Self {
        match event.clone() {
            WorldEvent::PlayerJoined {
                player_id,
                display_name,
            } => EventDto::PlayerJoined {
                player_id: player_id.to_string(),
                display_name,
            },
            WorldEvent::PlayerLeft { player_id } => EventDto::PlayerLeft {
                player_id: player_id.to_string(),
            },
            WorldEvent::ProjectileSpawned {
                id,
                owner,
                weapon,
                x,
                y,
                vx,
                vy,
                client_shot_id,
            } => EventDto::ProjectileSpawned {
                id,
                owner_id: owner.to_string(),
                weapon,
                x,
                y,
                vx,
                vy,
                client_shot_id,
            },
            WorldEvent::ProjectileRetired { id, reason } => EventDto::ProjectileRetired {
                id,
                reason: reason.into(),
            },
            WorldEvent::Hit {
                target,
                attacker,
                damage,
                headshot,
                splash,
            } => EventDto::Hit {
                target: target.into(),
                attacker_id: attacker.map(|id| id.to_string()),
                damage,
                headshot,
                splash,
            },
            WorldEvent::Killed { victim, killer } => EventDto::Killed {
                victim: victim.into(),
                killer_id: killer.map(|id| id.to_string()),
            },
            WorldEvent::Explosion { x, y, radius } => EventDto::Explosion { x, y, radius },
            WorldEvent::Downed { player_id } => EventDto::Downed {
                player_id: player_id.to_string(),
            },
            WorldEvent::ReviveStarted { player_id, reviver } => EventDto::ReviveStarted {
                player_id: player_id.to_string(),
                reviver_id: reviver.to_string(),
            },
            WorldEvent::ReviveCancelled { player_id, reviver } => EventDto::ReviveCancelled {
                player_id: player_id.to_string(),
                reviver_id: reviver.to_string(),
            },
            WorldEvent::Revived { player_id, reviver } => EventDto::Revived {
                player_id: player_id.to_string(),
                reviver_id: reviver.to_string(),
            },
            WorldEvent::Eliminated { player_id } => EventDto::Eliminated {
                player_id: player_id.to_string(),
            },
            WorldEvent::Respawned { player_id } => EventDto::Respawned {
                player_id: player_id.to_string(),
            },
            WorldEvent::StructureDamaged { key, hp } => EventDto::StructureDamaged {
                tile_x: key.x,
                tile_y: key.y,
                hp,
            },
            WorldEvent::StructureDestroyed { key } => EventDto::StructureDestroyed {
                tile_x: key.x,
                tile_y: key.y,
            },
            WorldEvent::GridReset { removed } => EventDto::GridReset { removed },
            WorldEvent::HostileSpawned { id, party } => EventDto::HostileSpawned {
                id,
                party_id: party,
            },
            WorldEvent::WaveStarted { party, wave } => EventDto::WaveStarted {
                party_id: party,
                wave,
            },
            WorldEvent::WaveCleared { party, wave } => EventDto::WaveCleared {
                party_id: party,
                wave,
            },
            WorldEvent::WaveRestarted { party, wave } => EventDto::WaveRestarted {
                party_id: party,
                wave,
            },
            WorldEvent::GameOver { party, wave, score } => EventDto::GameOver {
                party_id: party,
                wave,
                score,
            },
            WorldEvent::RoleChanged { player_id, role } => EventDto::RoleChanged {
                player_id: player_id.to_string(),
                role,
            },
            WorldEvent::WeaponLevelChanged {
                player_id,
                weapon,
                level,
            } => EventDto::WeaponLevelChanged {
                player_id: player_id.to_string(),
                weapon,
                level,
            },
            WorldEvent::Chat { player_id, text } => EventDto::Chat {
                player_id: player_id.to_string(),
                text,
            },
        }
    }
}

/// World lifecycle state sent to clients for UI flow.
#[derive(Debug, Clone, Serialize)]
pub enum ServerStateDto {
    Starting,
    Running { mode: WorldMode, tick_rate_hz: u32 },
    Stopped,
}

impl From<ServerState> for ServerStateDto {
    fn from(state: ServerState) -> Self {
        match state {
            ServerState::Starting => ServerStateDto::Starting,
            ServerState::Running { mode, tick_rate_hz } => {
                ServerStateDto::Running { mode, tick_rate_hz }
            }
            ServerState::Stopped => ServerStateDto::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ClientMessage {
        serde_json::from_value(value).expect("client message should parse")
    }

    #[test]
    fn when_place_structure_arrives_then_tile_becomes_key() {
        let inbound: Inbound = parse(json!({
            "type": "PlaceStructure",
            "data": { "kind": "wall", "tile_x": 640, "tile_y": 640 }
        }))
        .into();
        assert!(matches!(
            inbound,
            Inbound::Command(Command::PlaceStructure {
                kind: StructureKind::Wall,
                key: TileKey { x: 640, y: 640 },
            })
        ));
    }

    #[test]
    fn when_reload_has_no_data_then_it_still_parses() {
        let inbound: Inbound = parse(json!({ "type": "Reload" })).into();
        assert!(matches!(inbound, Inbound::Command(Command::Reload)));
    }

    #[test]
    fn when_party_action_is_tagged_then_it_maps_to_party_command() {
        let inbound: Inbound = parse(json!({
            "type": "Party",
            "data": { "action": "join", "party_id": 7 }
        }))
        .into();
        assert!(matches!(
            inbound,
            Inbound::Command(Command::Party(PartyCommand::Join { party_id: 7 }))
        ));
    }

    #[test]
    fn when_input_omits_fields_then_they_default_to_zero() {
        let inbound: Inbound = parse(json!({ "type": "Input", "data": { "move_x": 1.0 } })).into();
        let Inbound::Input(input) = inbound else {
            panic!("expected input");
        };
        assert_eq!(input.move_x, 1.0);
        assert_eq!(input.aim_y, 0.0);
    }

    #[test]
    fn when_fire_is_missing_angle_then_parsing_fails() {
        let parsed = serde_json::from_value::<ClientMessage>(json!({ "type": "Fire", "data": {} }));
        assert!(parsed.is_err());
    }

    #[test]
    fn rejections_carry_code_and_message() {
        let msg: ServerMessage = Rejection {
            player_id: 3,
            action: ActionKind::PlaceStructure,
            reason: RejectReason::TooFar,
        }
        .into();
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(value["type"], "Rejected");
        assert_eq!(value["data"]["action"], "place_structure");
        assert_eq!(value["data"]["reason"], "too_far");
        assert_eq!(value["data"]["message"], "too far away to build there");
    }

    #[test]
    fn shop_cells_serialize_without_hp() {
        let listing = StructureListing {
            revision: 1,
            cells: vec![StructureSnapshot {
                key: TileKey { x: 1520, y: 2200 },
                kind: StructureKind::Shop,
                owner: None,
                hp: f32::INFINITY,
            }],
        };
        let value = serde_json::to_value(ServerMessage::Structures((&listing).into()))
            .expect("serialize");
        assert_eq!(value["data"]["cells"][0]["kind"], "shop");
        assert!(value["data"]["cells"][0].get("hp").is_none());
    }
}
