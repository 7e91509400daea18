//! Gameplay tuning for projectiles and splash damage.

use serde::Deserialize;

/// Shape of the splash damage curve beyond the direct-hit victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplashFalloff {
    /// Same splash damage anywhere inside the radius.
    Constant,
    /// Splash damage fades to zero at the edge of the radius.
    Linear,
}

impl SplashFalloff {
    /// Scale factor for a victim at `distance_ratio` (0.0 centre, 1.0 edge).
    pub fn factor(self, distance_ratio: f32) -> f32 {
        match self {
            SplashFalloff::Constant => 1.0,
            SplashFalloff::Linear => (1.0 - distance_ratio).clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectileTuning {
    /// World-space collision radius in pixels.
    pub radius: f32,

    /// Downward acceleration applied to arcing projectiles, px/s^2.
    pub arc_gravity: f32,

    /// Maximum steering turn per tick for arcing projectiles, in degrees.
    pub max_turn_deg_per_tick: f32,

    /// Extra acceleration toward the aim target, px/s^2.
    pub steer_acceleration: f32,

    /// No extra acceleration once the projectile is this close to the target.
    pub steer_min_distance: f32,

    pub splash_radius: f32,

    /// Splash damage as a fraction of the base damage.
    pub splash_multiplier: f32,

    pub splash_falloff: SplashFalloff,

    /// Ticks a retired projectile id stays quarantined before reuse.
    pub id_reuse_delay_ticks: u64,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            radius: 4.0,
            arc_gravity: 600.0,
            max_turn_deg_per_tick: 4.0,
            steer_acceleration: 300.0,
            steer_min_distance: 60.0,
            splash_radius: 120.0,
            splash_multiplier: 0.5,
            splash_falloff: SplashFalloff::Constant,
            id_reuse_delay_ticks: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_falloff_is_linear_then_edge_deals_nothing() {
        assert_eq!(SplashFalloff::Linear.factor(1.0), 0.0);
        assert_eq!(SplashFalloff::Linear.factor(0.0), 1.0);
        assert_eq!(SplashFalloff::Constant.factor(0.9), 1.0);
    }
}
