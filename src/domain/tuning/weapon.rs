//! Gameplay tuning for weapons.
//!
//! Every derived number is a pure function of `(kind, level)`; per-level scaling is linear and
//! the level is capped by `max_level`.

use crate::domain::player::Role;
use crate::domain::weapon::WeaponKind;
use serde::Deserialize;

/// How a weapon's projectiles travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightModel {
    /// Constant velocity in a straight line.
    Straight,
    /// Gravity arc with owner steering; detonates into splash damage.
    Arc,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WeaponSpec {
    /// Damage per projectile at level 0.
    pub damage: f32,
    /// Minimum milliseconds between two shots at level 0.
    pub fire_interval_ms: u64,
    /// Projectile speed in pixels per second at level 0.
    pub bullet_speed: f32,
    /// Rounds per magazine at level 0.
    pub magazine: u32,
    /// Reload duration in milliseconds at level 0.
    pub reload_ms: u64,
    /// Projectiles spawned per shot.
    pub pellets: u32,
    /// Angle between neighbouring pellets, in degrees.
    pub spread_deg: f32,
    /// Projectile lifetime in milliseconds.
    pub ttl_ms: u64,
    pub flight: FlightModel,
    /// Lowest role allowed to equip this weapon.
    pub min_role: Role,
}

/// Per-level percentage changes (0.10 = 10% per level).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LevelScaling {
    pub damage: f32,
    pub magazine: f32,
    pub bullet_speed: f32,
    pub fire_interval: f32,
    pub reload: f32,
}

impl Default for LevelScaling {
    fn default() -> Self {
        Self {
            damage: 0.10,
            magazine: 0.10,
            bullet_speed: 0.05,
            fire_interval: 0.05,
            reload: 0.08,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeaponTuning {
    pub max_level: u8,
    pub scaling: LevelScaling,
    pub pistol: WeaponSpec,
    pub rifle: WeaponSpec,
    pub shotgun: WeaponSpec,
    pub smg: WeaponSpec,
    pub sniper: WeaponSpec,
    pub rocket_launcher: WeaponSpec,
}

impl Default for WeaponTuning {
    fn default() -> Self {
        Self {
            max_level: 5,
            scaling: LevelScaling::default(),
            pistol: WeaponSpec {
                damage: 20.0,
                fire_interval_ms: 300,
                bullet_speed: 900.0,
                magazine: 12,
                reload_ms: 1200,
                pellets: 1,
                spread_deg: 0.0,
                ttl_ms: 1500,
                flight: FlightModel::Straight,
                min_role: Role::Player,
            },
            rifle: WeaponSpec {
                damage: 14.0,
                fire_interval_ms: 110,
                bullet_speed: 1100.0,
                magazine: 30,
                reload_ms: 1800,
                pellets: 1,
                spread_deg: 0.0,
                ttl_ms: 1500,
                flight: FlightModel::Straight,
                min_role: Role::Player,
            },
            shotgun: WeaponSpec {
                damage: 9.0,
                fire_interval_ms: 800,
                bullet_speed: 800.0,
                magazine: 6,
                reload_ms: 2200,
                pellets: 7,
                spread_deg: 6.0,
                ttl_ms: 600,
                flight: FlightModel::Straight,
                min_role: Role::Player,
            },
            smg: WeaponSpec {
                damage: 10.0,
                fire_interval_ms: 75,
                bullet_speed: 1000.0,
                magazine: 40,
                reload_ms: 1600,
                pellets: 1,
                spread_deg: 0.0,
                ttl_ms: 1200,
                flight: FlightModel::Straight,
                min_role: Role::Mod,
            },
            sniper: WeaponSpec {
                damage: 80.0,
                fire_interval_ms: 1300,
                bullet_speed: 2200.0,
                magazine: 5,
                reload_ms: 2600,
                pellets: 1,
                spread_deg: 0.0,
                ttl_ms: 2000,
                flight: FlightModel::Straight,
                min_role: Role::Mod,
            },
            rocket_launcher: WeaponSpec {
                damage: 200.0,
                fire_interval_ms: 1500,
                bullet_speed: 500.0,
                magazine: 3,
                reload_ms: 3000,
                pellets: 1,
                spread_deg: 0.0,
                ttl_ms: 4000,
                flight: FlightModel::Arc,
                min_role: Role::Admin,
            },
        }
    }
}

impl WeaponTuning {
    pub fn spec(&self, kind: WeaponKind) -> &WeaponSpec {
        match kind {
            WeaponKind::Pistol => &self.pistol,
            WeaponKind::Rifle => &self.rifle,
            WeaponKind::Shotgun => &self.shotgun,
            WeaponKind::Smg => &self.smg,
            WeaponKind::Sniper => &self.sniper,
            WeaponKind::RocketLauncher => &self.rocket_launcher,
        }
    }

    pub fn clamp_level(&self, level: u8) -> u8 {
        level.min(self.max_level)
    }

    pub fn damage(&self, kind: WeaponKind, level: u8) -> f32 {
        let level = self.clamp_level(level) as f32;
        self.spec(kind).damage * (1.0 + self.scaling.damage * level)
    }

    pub fn magazine(&self, kind: WeaponKind, level: u8) -> u32 {
        let level = self.clamp_level(level) as f32;
        let scaled = self.spec(kind).magazine as f32 * (1.0 + self.scaling.magazine * level);
        (scaled.round() as u32).max(1)
    }

    pub fn bullet_speed(&self, kind: WeaponKind, level: u8) -> f32 {
        let level = self.clamp_level(level) as f32;
        self.spec(kind).bullet_speed * (1.0 + self.scaling.bullet_speed * level)
    }

    pub fn fire_interval_ms(&self, kind: WeaponKind, level: u8) -> u64 {
        let level = self.clamp_level(level) as f32;
        let factor = (1.0 - self.scaling.fire_interval * level).max(0.1);
        (self.spec(kind).fire_interval_ms as f32 * factor).round() as u64
    }

    pub fn reload_ms(&self, kind: WeaponKind, level: u8) -> u64 {
        let level = self.clamp_level(level) as f32;
        let factor = (1.0 - self.scaling.reload * level).max(0.1);
        (self.spec(kind).reload_ms as f32 * factor).round() as u64
    }

    /// Role gate applied when a weapon is equipped.
    pub fn allows(&self, role: Role, kind: WeaponKind) -> bool {
        role >= self.spec(kind).min_role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_level_is_zero_then_pistol_matches_base_table() {
        let tuning = WeaponTuning::default();
        assert_eq!(tuning.magazine(WeaponKind::Pistol, 0), 12);
        assert_eq!(tuning.fire_interval_ms(WeaponKind::Pistol, 0), 300);
    }

    #[test]
    fn when_level_increases_then_stats_move_in_the_right_direction() {
        let tuning = WeaponTuning::default();
        for kind in WeaponKind::ALL {
            for level in 0..tuning.max_level {
                let next = level + 1;
                assert!(tuning.damage(kind, next) > tuning.damage(kind, level));
                assert!(tuning.magazine(kind, next) >= tuning.magazine(kind, level));
                assert!(tuning.bullet_speed(kind, next) > tuning.bullet_speed(kind, level));
                assert!(tuning.fire_interval_ms(kind, next) <= tuning.fire_interval_ms(kind, level));
                assert!(tuning.reload_ms(kind, next) < tuning.reload_ms(kind, level));
            }
        }
    }

    #[test]
    fn when_level_exceeds_cap_then_it_is_clamped() {
        let tuning = WeaponTuning::default();
        assert_eq!(
            tuning.damage(WeaponKind::Rifle, 40),
            tuning.damage(WeaponKind::Rifle, tuning.max_level)
        );
    }

    #[test]
    fn when_role_is_elevated_then_rarer_weapons_unlock() {
        let tuning = WeaponTuning::default();
        assert!(tuning.allows(Role::Player, WeaponKind::Pistol));
        assert!(!tuning.allows(Role::Player, WeaponKind::Sniper));
        assert!(tuning.allows(Role::Mod, WeaponKind::Sniper));
        assert!(!tuning.allows(Role::Mod, WeaponKind::RocketLauncher));
        assert!(tuning.allows(Role::Owner, WeaponKind::RocketLauncher));
    }
}
