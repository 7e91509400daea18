// Gameplay tuning tables. Pure data, loaded once at startup.

pub mod player;
pub mod projectile;
pub mod structure;
pub mod wave;
pub mod weapon;

use serde::Deserialize;
use std::path::Path;

pub use player::{CombatTuning, PlayerTuning};
pub use projectile::{ProjectileTuning, SplashFalloff};
pub use structure::StructureTuning;
pub use wave::{PartyTuning, WaveDefinition, WaveTuning};
pub use weapon::{FlightModel, WeaponSpec, WeaponTuning};

/// Playfield size. Y grows downward; the floor sits at `height`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorldTuning {
    pub width: f32,
    pub height: f32,
}

impl Default for WorldTuning {
    fn default() -> Self {
        Self {
            width: 3200.0,
            height: 2400.0,
        }
    }
}

impl WorldTuning {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameTuning {
    pub world: WorldTuning,
    pub player: PlayerTuning,
    pub combat: CombatTuning,
    pub weapons: WeaponTuning,
    pub projectile: ProjectileTuning,
    pub structures: StructureTuning,
    pub party: PartyTuning,
    pub waves: WaveTuning,
}

#[derive(Debug)]
pub enum TuningError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl GameTuning {
    /// Parses a TOML document; missing tables and fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, TuningError> {
        toml::from_str(raw).map_err(TuningError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, TuningError> {
        let raw = std::fs::read_to_string(path).map_err(TuningError::Io)?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::weapon::WeaponKind;

    #[test]
    fn when_toml_overrides_a_field_then_other_defaults_survive() {
        let tuning = GameTuning::from_toml_str(
            r#"
            [structures]
            placement_radius = 500.0

            [weapons.pistol]
            damage = 25.0
            fire_interval_ms = 250
            bullet_speed = 900.0
            magazine = 10
            reload_ms = 1000
            pellets = 1
            spread_deg = 0.0
            ttl_ms = 1500
            flight = "straight"
            min_role = "player"
            "#,
        )
        .expect("tuning should parse");

        assert_eq!(tuning.structures.placement_radius, 500.0);
        assert_eq!(tuning.structures.tile_size, 40);
        assert_eq!(tuning.weapons.magazine(WeaponKind::Pistol, 0), 10);
        assert_eq!(tuning.weapons.magazine(WeaponKind::Rifle, 0), 30);
    }

    #[test]
    fn when_toml_is_invalid_then_parse_error_is_returned() {
        let result = GameTuning::from_toml_str("[party\nmax_members = ");
        assert!(matches!(result, Err(TuningError::Parse(_))));
    }
}
