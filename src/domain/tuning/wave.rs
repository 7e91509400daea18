//! Gameplay tuning for parties and cooperative waves.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartyTuning {
    pub max_members: usize,
    /// Shared lives at the start of a run.
    pub team_lives: u32,
}

impl Default for PartyTuning {
    fn default() -> Self {
        Self {
            max_members: 10,
            team_lives: 3,
        }
    }
}

/// Wave progression: wave `n` (1-based) spawns `base_hostiles + (n - 1) * hostiles_per_wave`
/// hostiles whose health and speed grow linearly per wave.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveTuning {
    /// Countdown before the first wave of a run.
    pub countdown_ms: u64,
    /// Countdown between a cleared wave and the next one.
    pub intermission_ms: u64,
    pub base_hostiles: u32,
    pub hostiles_per_wave: u32,
    pub hostile_hp: f32,
    pub hp_growth: f32,
    pub hostile_speed: f32,
    pub speed_growth: f32,
    pub max_hostile_speed: f32,
    pub hostile_radius: f32,
    pub contact_damage: f32,
    pub attack_cooldown_ms: u64,
    pub spawn_interval_ms: u64,
    pub kill_score: u64,
    pub wave_clear_score: u64,
}

impl Default for WaveTuning {
    fn default() -> Self {
        Self {
            countdown_ms: 5000,
            intermission_ms: 8000,
            base_hostiles: 4,
            hostiles_per_wave: 2,
            hostile_hp: 60.0,
            hp_growth: 0.15,
            hostile_speed: 90.0,
            speed_growth: 0.05,
            max_hostile_speed: 220.0,
            hostile_radius: 20.0,
            contact_damage: 10.0,
            attack_cooldown_ms: 800,
            spawn_interval_ms: 700,
            kill_score: 10,
            wave_clear_score: 50,
        }
    }
}

/// Concrete numbers for one wave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveDefinition {
    pub hostile_count: u32,
    pub hostile_hp: f32,
    pub hostile_speed: f32,
}

impl WaveTuning {
    pub fn definition(&self, wave: u32) -> WaveDefinition {
        let step = wave.saturating_sub(1);
        WaveDefinition {
            hostile_count: self.base_hostiles + step * self.hostiles_per_wave,
            hostile_hp: self.hostile_hp * (1.0 + self.hp_growth * step as f32),
            hostile_speed: (self.hostile_speed * (1.0 + self.speed_growth * step as f32))
                .min(self.max_hostile_speed),
        }
    }
}
