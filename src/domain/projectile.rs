// Projectile engine: spawning, flight integration and an id-indexed arena.

use crate::domain::player::PlayerId;
use crate::domain::tuning::{FlightModel, ProjectileTuning, WorldTuning};
use crate::domain::weapon::WeaponKind;
use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};

pub type ProjectileId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: ProjectileId,
    /// `None` once the owner is gone. Ownerless projectiles never deal damage.
    pub owner: Option<PlayerId>,
    pub weapon: WeaponKind,
    pub flight: FlightModel,
    pub x: f32,
    pub y: f32,
    /// Position at the start of the last step; hit tests use the swept segment.
    pub prev_x: f32,
    pub prev_y: f32,
    pub vx: f32,
    pub vy: f32,
    pub damage: f32,
    pub spawned_at: u64,
    pub ttl_ms: u64,
    /// Client-side predicted id, echoed back so the client can reconcile.
    pub client_shot_id: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnParams {
    pub owner: PlayerId,
    pub weapon: WeaponKind,
    pub flight: FlightModel,
    pub origin: (f32, f32),
    pub angle: f32,
    pub speed: f32,
    pub damage: f32,
    pub ttl_ms: u64,
    pub client_shot_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Flying,
    Expired,
    OutOfBounds,
    HitGround,
}

impl Projectile {
    pub fn spawn(id: ProjectileId, params: SpawnParams, now: u64) -> Self {
        let (x, y) = params.origin;
        Self {
            id,
            owner: Some(params.owner),
            weapon: params.weapon,
            flight: params.flight,
            x,
            y,
            prev_x: x,
            prev_y: y,
            vx: params.angle.cos() * params.speed,
            vy: params.angle.sin() * params.speed,
            damage: params.damage,
            spawned_at: now,
            ttl_ms: params.ttl_ms,
            client_shot_id: params.client_shot_id,
        }
    }

    pub fn rotation(&self) -> f32 {
        self.vy.atan2(self.vx)
    }

    /// Advances one tick. `steer_target` is the owner's aim point and is only honoured for
    /// arcing projectiles.
    pub fn step(
        &mut self,
        dt: f32,
        now: u64,
        steer_target: Option<(f32, f32)>,
        world: &WorldTuning,
        tuning: &ProjectileTuning,
    ) -> StepOutcome {
        if self.flight == FlightModel::Arc {
            self.vy += tuning.arc_gravity * dt;
            if let Some(target) = steer_target {
                self.steer_toward(target, dt, tuning);
            }
        }

        self.prev_x = self.x;
        self.prev_y = self.y;
        self.x += self.vx * dt;
        self.y += self.vy * dt;

        if self.flight == FlightModel::Arc && self.y >= world.height {
            self.y = world.height;
            return StepOutcome::HitGround;
        }
        if !world.contains(self.x, self.y) {
            return StepOutcome::OutOfBounds;
        }
        if now.saturating_sub(self.spawned_at) >= self.ttl_ms {
            return StepOutcome::Expired;
        }
        StepOutcome::Flying
    }

    // Bounded turn rate keeps the rocket dodgeable; the clamp is the balancing knob.
    fn steer_toward(&mut self, target: (f32, f32), dt: f32, tuning: &ProjectileTuning) {
        let dx = target.0 - self.x;
        let dy = target.1 - self.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= f32::EPSILON {
            return;
        }

        let speed = (self.vx * self.vx + self.vy * self.vy).sqrt();
        let current = self.vy.atan2(self.vx);
        let desired = dy.atan2(dx);
        let max_turn = tuning.max_turn_deg_per_tick.to_radians();
        let turn = wrap_angle(desired - current).clamp(-max_turn, max_turn);
        let heading = current + turn;
        self.vx = heading.cos() * speed;
        self.vy = heading.sin() * speed;

        if distance > tuning.steer_min_distance {
            self.vx += dx / distance * tuning.steer_acceleration * dt;
            self.vy += dy / distance * tuning.steer_acceleration * dt;
        }
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Aim angles for a multi-pellet shot, spread evenly around `base`.
pub fn spread_angles(base: f32, pellets: u32, spread_deg: f32) -> Vec<f32> {
    let pellets = pellets.max(1);
    let step = spread_deg.to_radians();
    let centre = (pellets - 1) as f32 / 2.0;
    (0..pellets)
        .map(|i| base + (i as f32 - centre) * step)
        .collect()
}

/// Slab of projectiles indexed by id. Freed ids wait `reuse_delay_ticks` before reuse so a
/// late client message cannot address a different projectile under a recycled id.
#[derive(Debug, Default)]
pub struct ProjectileArena {
    slots: Vec<Option<Projectile>>,
    quarantine: VecDeque<(ProjectileId, u64)>,
    free: Vec<ProjectileId>,
    reuse_delay_ticks: u64,
    live: usize,
}

impl ProjectileArena {
    pub fn new(reuse_delay_ticks: u64) -> Self {
        Self {
            reuse_delay_ticks,
            ..Self::default()
        }
    }

    pub fn spawn(&mut self, params: SpawnParams, now: u64, tick: u64) -> ProjectileId {
        while let Some(&(id, ready_at)) = self.quarantine.front() {
            if ready_at > tick {
                break;
            }
            self.quarantine.pop_front();
            self.free.push(id);
        }

        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.slots.push(None);
                (self.slots.len() - 1) as ProjectileId
            }
        };
        self.slots[id as usize] = Some(Projectile::spawn(id, params, now));
        self.live += 1;
        id
    }

    pub fn remove(&mut self, id: ProjectileId, tick: u64) -> Option<Projectile> {
        let removed = self.slots.get_mut(id as usize)?.take()?;
        self.quarantine
            .push_back((id, tick + self.reuse_delay_ticks));
        self.live -= 1;
        Some(removed)
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.slots.get(id as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ProjectileId) -> Option<&mut Projectile> {
        self.slots.get_mut(id as usize)?.as_mut()
    }

    /// Live projectiles in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Projectile> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    pub fn ids(&self) -> Vec<ProjectileId> {
        self.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Detaches every projectile owned by `owner`; they keep flying but become harmless.
    pub fn orphan(&mut self, owner: PlayerId) {
        for projectile in self.iter_mut() {
            if projectile.owner == Some(owner) {
                projectile.owner = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(flight: FlightModel, angle: f32) -> SpawnParams {
        SpawnParams {
            owner: 1,
            weapon: WeaponKind::Pistol,
            flight,
            origin: (1000.0, 1000.0),
            angle,
            speed: 600.0,
            damage: 20.0,
            ttl_ms: 500,
            client_shot_id: Some(9),
        }
    }

    #[test]
    fn when_straight_projectile_steps_then_it_moves_at_constant_velocity() {
        let mut p = Projectile::spawn(0, params(FlightModel::Straight, 0.0), 0);
        let world = WorldTuning::default();
        let tuning = ProjectileTuning::default();
        assert_eq!(p.step(0.1, 100, None, &world, &tuning), StepOutcome::Flying);
        assert!((p.x - 1060.0).abs() < 1e-3);
        assert_eq!(p.y, 1000.0);
        assert_eq!(p.prev_x, 1000.0);
    }

    #[test]
    fn projectile_never_outlives_ttl_by_more_than_one_tick() {
        let world = WorldTuning::default();
        let tuning = ProjectileTuning::default();
        let tick_ms = 33u64;
        let mut p = Projectile::spawn(0, params(FlightModel::Straight, 0.0), 0);
        p.vx = 1.0;
        let mut now = 0;
        loop {
            now += tick_ms;
            if p.step(tick_ms as f32 / 1000.0, now, None, &world, &tuning) != StepOutcome::Flying {
                break;
            }
        }
        assert!(now >= p.ttl_ms);
        assert!(now <= p.ttl_ms + tick_ms);
    }

    #[test]
    fn when_projectile_leaves_world_then_it_is_out_of_bounds() {
        let world = WorldTuning::default();
        let tuning = ProjectileTuning::default();
        let mut p = Projectile::spawn(0, params(FlightModel::Straight, PI), 0);
        p.x = 10.0;
        assert_eq!(p.step(0.1, 10, None, &world, &tuning), StepOutcome::OutOfBounds);
    }

    #[test]
    fn when_arc_projectile_falls_then_it_hits_ground() {
        let world = WorldTuning::default();
        let tuning = ProjectileTuning::default();
        let mut p = Projectile::spawn(0, params(FlightModel::Arc, 0.0), 0);
        p.ttl_ms = 60_000;
        let mut outcome = StepOutcome::Flying;
        for tick in 1..400u64 {
            outcome = p.step(0.033, tick * 33, None, &world, &tuning);
            if outcome != StepOutcome::Flying {
                break;
            }
        }
        assert_eq!(outcome, StepOutcome::HitGround);
        assert_eq!(p.y, world.height);
    }

    #[test]
    fn when_steering_then_turn_per_tick_is_clamped() {
        let world = WorldTuning::default();
        let mut tuning = ProjectileTuning::default();
        tuning.arc_gravity = 0.0;
        tuning.steer_acceleration = 0.0;
        let mut p = Projectile::spawn(0, params(FlightModel::Arc, 0.0), 0);
        p.ttl_ms = 60_000;
        // Target straight behind: the desired turn is 180 degrees.
        p.step(0.01, 10, Some((100.0, 1000.0 - 0.001)), &world, &tuning);
        let turned = wrap_angle(p.rotation()).abs();
        assert!(turned <= tuning.max_turn_deg_per_tick.to_radians() + 1e-4);
        assert!(turned > 0.0);
    }

    #[test]
    fn when_shotgun_fires_then_pellets_are_spread_symmetrically() {
        let angles = spread_angles(0.0, 3, 10.0);
        assert_eq!(angles.len(), 3);
        assert!((angles[0] + 10f32.to_radians()).abs() < 1e-6);
        assert_eq!(angles[1], 0.0);
        assert!((angles[2] - 10f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn when_id_is_freed_then_it_is_reused_only_after_delay() {
        let mut arena = ProjectileArena::new(5);
        let first = arena.spawn(params(FlightModel::Straight, 0.0), 0, 0);
        assert!(arena.remove(first, 10).is_some());

        let second = arena.spawn(params(FlightModel::Straight, 0.0), 0, 12);
        assert_ne!(second, first);

        let third = arena.spawn(params(FlightModel::Straight, 0.0), 0, 15);
        assert_eq!(third, first);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn when_owner_leaves_then_projectiles_are_orphaned() {
        let mut arena = ProjectileArena::new(5);
        let id = arena.spawn(params(FlightModel::Straight, 0.0), 0, 0);
        arena.orphan(1);
        assert_eq!(arena.get(id).and_then(|p| p.owner), None);
    }

    #[test]
    fn when_unknown_id_is_removed_then_nothing_happens() {
        let mut arena = ProjectileArena::new(5);
        assert!(arena.remove(42, 0).is_none());
        assert!(arena.is_empty());
    }
}
