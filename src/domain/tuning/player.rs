//! Gameplay tuning for player avatars and the damage rules applied to them.
//!
//! Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

use crate::domain::weapon::WeaponKind;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Movement speed in pixels per second at full input.
    pub max_speed: f32,

    /// World-space body radius in pixels (server-side hit checks).
    pub radius: f32,

    /// Head sub-volume radius in pixels.
    pub head_radius: f32,

    /// Head centre offset above the body centre (negative y is up).
    pub head_offset: f32,

    pub max_hp: f32,

    /// Free-play respawn delay after elimination.
    pub respawn_ms: u64,

    /// Spawn protection window.
    pub spawn_shield_ms: u64,

    /// Fraction of incoming damage absorbed while the shield is up (1.0 = immune).
    pub shield_mitigation: f32,

    /// Immunity window after taking damage; blocks multi-hits from one frame of overlap.
    pub hit_immunity_ms: u64,

    pub inventory_slots: usize,

    /// Weapons granted to a profile that has never been saved.
    pub default_loadout: Vec<WeaponKind>,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_speed: 260.0,
            radius: 24.0,
            head_radius: 10.0,
            head_offset: 18.0,
            max_hp: 100.0,
            respawn_ms: 3000,
            spawn_shield_ms: 2000,
            shield_mitigation: 1.0,
            hit_immunity_ms: 30,
            inventory_slots: 5,
            default_loadout: vec![WeaponKind::Pistol, WeaponKind::Shotgun, WeaponKind::Rifle],
        }
    }
}

/// Downed/revive and friendly-fire rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Whether members of the same party can damage each other.
    pub friendly_fire: bool,

    /// Damage multiplier for head hits (1.0 keeps the distinction display-only).
    pub headshot_multiplier: f32,

    /// A teammate must stay within this distance to revive.
    pub revive_radius: f32,

    /// Continuous proximity time needed to finish a revive.
    pub revive_ms: u64,

    /// Time a downed player survives before being eliminated.
    pub bleed_out_ms: u64,

    /// Health restored on revive as a fraction of max health.
    pub revive_hp_fraction: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            friendly_fire: false,
            headshot_multiplier: 1.0,
            revive_radius: 80.0,
            revive_ms: 3000,
            bleed_out_ms: 15_000,
            revive_hp_fraction: 0.5,
        }
    }
}
