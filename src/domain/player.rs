// Player entity, roles and the persisted profile.

use crate::domain::tuning::{PlayerTuning, WorldTuning};
use crate::domain::weapon::WeaponKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type PlayerId = u64;
pub type PartyId = u32;

/// Authority tier. Ordering matters: later variants include everything earlier ones can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Player,
    Mod,
    Admin,
    Owner,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "player" => Some(Role::Player),
            "mod" | "moderator" => Some(Role::Mod),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Mod => "mod",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

/// Timed proximity interaction reviving a downed player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviveProgress {
    pub reviver: PlayerId,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifeState {
    Alive,
    Downed {
        bleed_out_at: u64,
        revive: Option<ReviveProgress>,
    },
    Eliminated {
        /// Free-play respawn time; `None` inside a party run (waits for the next wave).
        respawn_at: Option<u64>,
    },
}

/// Latest movement/aim state from the client. Not an action; the last value wins.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    pub move_x: f32,
    pub move_y: f32,
    pub aim_x: f32,
    pub aim_y: f32,
}

impl PlayerInput {
    /// Rejects non-finite values and clamps the rest into range.
    pub fn sanitized(mut self, world: &WorldTuning) -> Option<Self> {
        if !self.move_x.is_finite()
            || !self.move_y.is_finite()
            || !self.aim_x.is_finite()
            || !self.aim_y.is_finite()
        {
            return None;
        }

        self.move_x = self.move_x.clamp(-1.0, 1.0);
        self.move_y = self.move_y.clamp(-1.0, 1.0);
        self.aim_x = self.aim_x.clamp(0.0, world.width);
        self.aim_y = self.aim_y.clamp(0.0, world.height);
        Some(self)
    }
}

/// Durable per-account data, loaded on join and saved on relevant mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub account_id: u64,
    pub role: Role,
    pub inventory: Vec<Option<WeaponKind>>,
    #[serde(default)]
    pub weapon_levels: BTreeMap<WeaponKind, u8>,
    #[serde(default)]
    pub kills: u64,
    #[serde(default)]
    pub deaths: u64,
    #[serde(default)]
    pub best_wave: u32,
    #[serde(default)]
    pub tutorial_seen: bool,
}

impl PlayerProfile {
    pub fn new_default(account_id: u64, role: Role, tuning: &PlayerTuning) -> Self {
        let mut inventory = vec![None; tuning.inventory_slots];
        for (slot, kind) in inventory.iter_mut().zip(tuning.default_loadout.iter()) {
            *slot = Some(*kind);
        }
        Self {
            account_id,
            role,
            inventory,
            weapon_levels: BTreeMap::new(),
            kills: 0,
            deaths: 0,
            best_wave: 0,
            tutorial_seen: false,
        }
    }
}

pub struct Player {
    pub id: PlayerId,
    pub conn_token: u64,
    pub display_name: String,

    // Server-owned kinematics.
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,

    pub hp: f32,
    pub max_hp: f32,
    /// Role granted by the auth service for this session; profile changes never go below it.
    pub session_role: Role,
    pub role: Role,
    pub inventory: Vec<Option<WeaponKind>>,
    pub equipped: Option<WeaponKind>,
    pub weapon_levels: BTreeMap<WeaponKind, u8>,
    pub life: LifeState,

    pub input: PlayerInput,

    /// Immune to damage while `now < immune_until`.
    pub immune_until: u64,
    /// Spawn protection; damage is mitigated while `now < shield_until`.
    pub shield_until: u64,

    pub party: Option<PartyId>,
    pub kills: u64,
    pub deaths: u64,
    pub best_wave: u32,
    pub tutorial_seen: bool,
}

impl Player {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        id: PlayerId,
        conn_token: u64,
        display_name: String,
        session_role: Role,
        profile: &PlayerProfile,
        position: (f32, f32),
        now: u64,
        tuning: &PlayerTuning,
    ) -> Self {
        let mut player = Self {
            id,
            conn_token,
            display_name,
            x: position.0,
            y: position.1,
            vx: 0.0,
            vy: 0.0,
            hp: tuning.max_hp,
            max_hp: tuning.max_hp,
            session_role,
            role: session_role,
            inventory: Vec::new(),
            equipped: None,
            weapon_levels: BTreeMap::new(),
            life: LifeState::Alive,
            input: PlayerInput::default(),
            immune_until: 0,
            shield_until: now + tuning.spawn_shield_ms,
            party: None,
            kills: 0,
            deaths: 0,
            best_wave: 0,
            tutorial_seen: false,
        };
        player.apply_profile(profile, tuning);
        player
    }

    /// Copies durable fields from a loaded profile. The equipped weapon is left to the caller.
    pub fn apply_profile(&mut self, profile: &PlayerProfile, tuning: &PlayerTuning) {
        self.role = profile.role.max(self.session_role);
        let mut inventory = profile.inventory.clone();
        inventory.resize(tuning.inventory_slots, None);
        self.inventory = inventory;
        self.weapon_levels = profile.weapon_levels.clone();
        self.kills = profile.kills;
        self.deaths = profile.deaths;
        self.best_wave = profile.best_wave;
        self.tutorial_seen = profile.tutorial_seen;
    }

    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            account_id: self.id,
            role: self.role,
            inventory: self.inventory.clone(),
            weapon_levels: self.weapon_levels.clone(),
            kills: self.kills,
            deaths: self.deaths,
            best_wave: self.best_wave,
            tutorial_seen: self.tutorial_seen,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.life, LifeState::Alive)
    }

    pub fn weapon_level(&self, kind: WeaponKind) -> u8 {
        self.weapon_levels.get(&kind).copied().unwrap_or(0)
    }

    /// Damage actually taken after spawn-shield mitigation.
    pub fn mitigated(&self, damage: f32, now: u64, tuning: &PlayerTuning) -> f32 {
        if now < self.shield_until {
            damage * (1.0 - tuning.shield_mitigation).clamp(0.0, 1.0)
        } else {
            damage
        }
    }

    /// Resets combat state on (re)spawn.
    pub fn revive_at(&mut self, position: (f32, f32), hp: f32, now: u64, shield_ms: u64) {
        self.x = position.0;
        self.y = position.1;
        self.vx = 0.0;
        self.vy = 0.0;
        self.hp = hp;
        self.life = LifeState::Alive;
        self.immune_until = 0;
        self.shield_until = now + shield_ms;
        self.input = PlayerInput::default();
    }

    pub fn distance_sq_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}
