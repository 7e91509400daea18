//! Gameplay tuning for the building grid.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructureTuning {
    /// Edge length of one grid cell in pixels; tile keys are multiples of this.
    pub tile_size: i32,

    /// Max distance between the player and the cell centre for placement.
    pub placement_radius: f32,

    /// Minimum time between two deletions by the same player.
    pub delete_interval_ms: u64,

    /// Buildable vertical band `[band_min_y, band_max_y)` for tile keys.
    pub band_min_y: i32,
    pub band_max_y: i32,

    pub wall_hp: f32,
    pub barricade_hp: f32,
    pub platform_hp: f32,

    /// Cells of the untouchable shop region, seeded on world creation.
    pub shop_cells: Vec<(i32, i32)>,
}

impl Default for StructureTuning {
    fn default() -> Self {
        Self {
            tile_size: 40,
            placement_radius: 320.0,
            delete_interval_ms: 150,
            band_min_y: 320,
            band_max_y: 2240,
            wall_hp: 200.0,
            barricade_hp: 100.0,
            platform_hp: 60.0,
            shop_cells: vec![(1520, 2200), (1560, 2200), (1600, 2200), (1640, 2200)],
        }
    }
}
