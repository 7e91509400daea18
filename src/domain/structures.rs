// Structure grid: grid-aligned buildings with occupancy, band and proximity rules.

use crate::domain::errors::RejectReason;
use crate::domain::player::{PlayerId, Role};
use crate::domain::tuning::StructureTuning;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Wall,
    Barricade,
    /// Pass-through: never blocks projectiles.
    Platform,
    /// Reserved for the shop region; never placed or deleted by players.
    Shop,
}

impl StructureKind {
    pub fn blocks_projectiles(self) -> bool {
        !matches!(self, StructureKind::Platform)
    }

    fn max_hp(self, tuning: &StructureTuning) -> f32 {
        match self {
            StructureKind::Wall => tuning.wall_hp,
            StructureKind::Barricade => tuning.barricade_hp,
            StructureKind::Platform => tuning.platform_hp,
            StructureKind::Shop => f32::INFINITY,
        }
    }
}

/// Cell key in world units; both coordinates are multiples of the tile size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TileKey {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureCell {
    pub kind: StructureKind,
    pub owner: Option<PlayerId>,
    pub hp: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StructureChange {
    Placed {
        key: TileKey,
        kind: StructureKind,
        owner: Option<PlayerId>,
    },
    Damaged {
        key: TileKey,
        hp: f32,
    },
    Removed {
        key: TileKey,
    },
}

/// Changes since the previous snapshot. Absent when nothing changed.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureDiff {
    pub revision: u64,
    pub changes: Vec<StructureChange>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StructureHit {
    Absorbed,
    Damaged { hp: f32 },
    Destroyed,
}

#[derive(Debug, Default)]
pub struct StructureGrid {
    tile_size: i32,
    cells: BTreeMap<TileKey, StructureCell>,
    last_delete_at: HashMap<PlayerId, u64>,
    pending: Vec<StructureChange>,
    revision: u64,
}

impl StructureGrid {
    /// Grid seeded with the shop region.
    pub fn new(tuning: &StructureTuning) -> Self {
        let mut grid = Self {
            tile_size: tuning.tile_size.max(1),
            ..Self::default()
        };
        for &(x, y) in &tuning.shop_cells {
            grid.cells.insert(
                TileKey { x, y },
                StructureCell {
                    kind: StructureKind::Shop,
                    owner: None,
                    hp: f32::INFINITY,
                },
            );
        }
        grid
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, key: TileKey) -> Option<&StructureCell> {
        self.cells.get(&key)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&TileKey, &StructureCell)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn centre(&self, key: TileKey) -> (f32, f32) {
        let half = self.tile_size as f32 / 2.0;
        (key.x as f32 + half, key.y as f32 + half)
    }

    pub fn place(
        &mut self,
        player_id: PlayerId,
        player_pos: (f32, f32),
        kind: StructureKind,
        key: TileKey,
        tuning: &StructureTuning,
    ) -> Result<(), RejectReason> {
        if kind == StructureKind::Shop {
            return Err(RejectReason::ReservedStructure);
        }
        if key.x % self.tile_size != 0 || key.y % self.tile_size != 0 {
            return Err(RejectReason::Misaligned);
        }
        if self.cells.contains_key(&key) {
            return Err(RejectReason::CellOccupied);
        }
        if key.y < tuning.band_min_y || key.y >= tuning.band_max_y {
            return Err(RejectReason::OutsideBuildBand);
        }
        let (cx, cy) = self.centre(key);
        let (dx, dy) = (cx - player_pos.0, cy - player_pos.1);
        if dx * dx + dy * dy > tuning.placement_radius * tuning.placement_radius {
            return Err(RejectReason::TooFar);
        }

        self.cells.insert(
            key,
            StructureCell {
                kind,
                owner: Some(player_id),
                hp: kind.max_hp(tuning),
            },
        );
        self.record(StructureChange::Placed {
            key,
            kind,
            owner: Some(player_id),
        });
        Ok(())
    }

    /// Deletes a cell on behalf of `player_id`. Owners and moderators may delete.
    pub fn remove(
        &mut self,
        player_id: PlayerId,
        role: Role,
        key: TileKey,
        now: u64,
        tuning: &StructureTuning,
    ) -> Result<StructureCell, RejectReason> {
        if let Some(&last) = self.last_delete_at.get(&player_id)
            && now.saturating_sub(last) < tuning.delete_interval_ms
        {
            return Err(RejectReason::DeleteRateLimited);
        }
        let cell = self.cells.get(&key).ok_or(RejectReason::NoStructure)?;
        if cell.kind == StructureKind::Shop {
            return Err(RejectReason::ReservedStructure);
        }
        if cell.owner != Some(player_id) && role < Role::Mod {
            return Err(RejectReason::NotStructureOwner);
        }

        let removed = self
            .cells
            .remove(&key)
            .ok_or(RejectReason::NoStructure)?;
        self.last_delete_at.insert(player_id, now);
        self.record(StructureChange::Removed { key });
        Ok(removed)
    }

    /// First projectile-blocking cell crossed by the segment, with the point of entry.
    pub fn first_blocking(&self, from: (f32, f32), to: (f32, f32)) -> Option<(TileKey, (f32, f32))> {
        if self.cells.is_empty() {
            return None;
        }
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = (dx * dx + dy * dy).sqrt();
        let sample = (self.tile_size as f32 / 4.0).max(1.0);
        let steps = (length / sample).ceil().max(1.0) as u32;

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let point = (from.0 + dx * t, from.1 + dy * t);
            let key = self.key_at(point);
            if let Some(cell) = self.cells.get(&key)
                && cell.kind.blocks_projectiles()
            {
                return Some((key, point));
            }
        }
        None
    }

    /// Applies damage in worlds where structures are destructible; otherwise just absorbs.
    pub fn damage(&mut self, key: TileKey, amount: f32, destructible: bool) -> StructureHit {
        if !destructible {
            return StructureHit::Absorbed;
        }
        let Some(cell) = self.cells.get_mut(&key) else {
            return StructureHit::Absorbed;
        };
        if cell.kind == StructureKind::Shop {
            return StructureHit::Absorbed;
        }

        cell.hp -= amount;
        if cell.hp <= 0.0 {
            self.cells.remove(&key);
            self.record(StructureChange::Removed { key });
            StructureHit::Destroyed
        } else {
            let hp = cell.hp;
            self.record(StructureChange::Damaged { key, hp });
            StructureHit::Damaged { hp }
        }
    }

    /// Clears every player-built cell. The shop region survives.
    pub fn reset(&mut self) -> usize {
        let doomed: Vec<TileKey> = self
            .cells
            .iter()
            .filter(|(_, cell)| cell.kind != StructureKind::Shop)
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            self.cells.remove(key);
            self.record(StructureChange::Removed { key: *key });
        }
        doomed.len()
    }

    pub fn forget_player(&mut self, player_id: PlayerId) {
        self.last_delete_at.remove(&player_id);
    }

    /// Drains the changes accumulated since the last call.
    pub fn take_diff(&mut self) -> Option<StructureDiff> {
        if self.pending.is_empty() {
            return None;
        }
        Some(StructureDiff {
            revision: self.revision,
            changes: std::mem::take(&mut self.pending),
        })
    }

    fn key_at(&self, point: (f32, f32)) -> TileKey {
        let size = self.tile_size as f32;
        TileKey {
            x: (point.0 / size).floor() as i32 * self.tile_size,
            y: (point.1 / size).floor() as i32 * self.tile_size,
        }
    }

    fn record(&mut self, change: StructureChange) {
        self.revision += 1;
        self.pending.push(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> (StructureGrid, StructureTuning) {
        let tuning = StructureTuning::default();
        (StructureGrid::new(&tuning), tuning)
    }

    #[test]
    fn when_player_is_beyond_radius_then_placement_is_rejected_as_too_far() {
        let (mut grid, tuning) = grid();
        let result = grid.place(
            1,
            (600.0, 1800.0),
            StructureKind::Wall,
            TileKey { x: 640, y: 640 },
            &tuning,
        );
        assert_eq!(result, Err(RejectReason::TooFar));
        assert!(grid.get(TileKey { x: 640, y: 640 }).is_none());
    }

    #[test]
    fn when_cell_is_occupied_then_placement_is_rejected_and_original_kept() {
        let (mut grid, tuning) = grid();
        let key = TileKey { x: 640, y: 640 };
        grid.place(1, (650.0, 650.0), StructureKind::Wall, key, &tuning)
            .expect("first placement should succeed");
        for _ in 0..3 {
            let again = grid.place(2, (650.0, 650.0), StructureKind::Platform, key, &tuning);
            assert_eq!(again, Err(RejectReason::CellOccupied));
        }
        let cell = grid.get(key).expect("cell should exist");
        assert_eq!(cell.kind, StructureKind::Wall);
        assert_eq!(cell.owner, Some(1));
    }

    #[test]
    fn when_cell_is_outside_band_then_placement_is_rejected() {
        let (mut grid, tuning) = grid();
        let key = TileKey { x: 640, y: 40 };
        let result = grid.place(1, (650.0, 60.0), StructureKind::Wall, key, &tuning);
        assert_eq!(result, Err(RejectReason::OutsideBuildBand));
    }

    #[test]
    fn when_key_is_off_grid_then_placement_is_rejected() {
        let (mut grid, tuning) = grid();
        let key = TileKey { x: 641, y: 640 };
        let result = grid.place(1, (650.0, 650.0), StructureKind::Wall, key, &tuning);
        assert_eq!(result, Err(RejectReason::Misaligned));
    }

    #[test]
    fn when_shop_is_targeted_then_place_and_delete_are_rejected() {
        let (mut grid, tuning) = grid();
        let (x, y) = tuning.shop_cells[0];
        let shop = TileKey { x, y };
        assert_eq!(
            grid.place(1, (x as f32, y as f32), StructureKind::Shop, TileKey { x: 640, y: 640 }, &tuning),
            Err(RejectReason::ReservedStructure)
        );
        assert_eq!(
            grid.remove(1, Role::Owner, shop, 0, &tuning),
            Err(RejectReason::ReservedStructure)
        );
    }

    #[test]
    fn when_deleting_faster_than_interval_then_second_delete_is_rejected() {
        let (mut grid, tuning) = grid();
        let a = TileKey { x: 640, y: 640 };
        let b = TileKey { x: 680, y: 640 };
        grid.place(1, (660.0, 660.0), StructureKind::Wall, a, &tuning).expect("place a");
        grid.place(1, (660.0, 660.0), StructureKind::Wall, b, &tuning).expect("place b");

        grid.remove(1, Role::Player, a, 1000, &tuning).expect("first delete");
        assert_eq!(
            grid.remove(1, Role::Player, b, 1000 + tuning.delete_interval_ms - 1, &tuning),
            Err(RejectReason::DeleteRateLimited)
        );
        assert!(grid.remove(1, Role::Player, b, 1000 + tuning.delete_interval_ms, &tuning).is_ok());
    }

    #[test]
    fn when_player_deletes_someone_elses_cell_then_only_moderators_succeed() {
        let (mut grid, tuning) = grid();
        let key = TileKey { x: 640, y: 640 };
        grid.place(1, (660.0, 660.0), StructureKind::Wall, key, &tuning).expect("place");
        assert_eq!(
            grid.remove(2, Role::Player, key, 0, &tuning),
            Err(RejectReason::NotStructureOwner)
        );
        assert!(grid.remove(3, Role::Mod, key, 0, &tuning).is_ok());
    }

    #[test]
    fn when_nothing_changes_then_no_diff_is_produced() {
        let (mut grid, tuning) = grid();
        assert!(grid.take_diff().is_none());
        grid.place(1, (660.0, 660.0), StructureKind::Wall, TileKey { x: 640, y: 640 }, &tuning)
            .expect("place");
        let diff = grid.take_diff().expect("placement should produce a diff");
        assert_eq!(diff.changes.len(), 1);
        assert!(grid.take_diff().is_none());
    }

    #[test]
    fn when_segment_crosses_platform_then_it_is_not_blocked() {
        let (mut grid, tuning) = grid();
        grid.place(1, (660.0, 660.0), StructureKind::Platform, TileKey { x: 640, y: 640 }, &tuning)
            .expect("place platform");
        assert!(grid.first_blocking((600.0, 660.0), (720.0, 660.0)).is_none());

        grid.place(1, (700.0, 660.0), StructureKind::Wall, TileKey { x: 680, y: 640 }, &tuning)
            .expect("place wall");
        let (key, _) = grid
            .first_blocking((600.0, 660.0), (760.0, 660.0))
            .expect("wall should block");
        assert_eq!(key, TileKey { x: 680, y: 640 });
    }

    #[test]
    fn when_destructible_cell_runs_out_of_hp_then_it_is_destroyed() {
        let (mut grid, tuning) = grid();
        let key = TileKey { x: 640, y: 640 };
        grid.place(1, (660.0, 660.0), StructureKind::Barricade, key, &tuning).expect("place");
        assert_eq!(grid.damage(key, 500.0, false), StructureHit::Absorbed);
        assert_eq!(grid.damage(key, 40.0, true), StructureHit::Damaged { hp: 60.0 });
        assert_eq!(grid.damage(key, 60.0, true), StructureHit::Destroyed);
        assert!(grid.get(key).is_none());
    }

    #[test]
    fn when_grid_is_reset_then_only_shop_survives() {
        let (mut grid, tuning) = grid();
        grid.place(1, (660.0, 660.0), StructureKind::Wall, TileKey { x: 640, y: 640 }, &tuning)
            .expect("place");
        assert_eq!(grid.reset(), 1);
        assert_eq!(grid.len(), tuning.shop_cells.len());
    }
}
