// Collision and damage resolution: projectiles against players, hostiles and structures,
// splash, invulnerability windows, death transitions and revives.

use crate::domain::events::{RetireReason, WorldEvent};
use crate::domain::hostile::{Hostile, HostileId};
use crate::domain::player::{LifeState, PartyId, Player, PlayerId, ReviveProgress};
use crate::domain::projectile::{Projectile, ProjectileArena, ProjectileId, StepOutcome};
use crate::domain::spatial::{SpatialGrid, TargetRef, segment_point_distance_sq};
use crate::domain::structures::{StructureGrid, StructureHit, TileKey};
use crate::domain::tuning::{FlightModel, GameTuning, PlayerTuning, ProjectileTuning};
use std::collections::BTreeMap;

/// Per-tick inputs shared by every resolution step.
#[derive(Debug, Clone, Copy)]
pub struct CombatContext<'a> {
    pub now: u64,
    pub tick: u64,
    pub dt: f32,
    pub tuning: &'a GameTuning,
    /// Cooperative worlds let projectiles wear structures down.
    pub destructible_structures: bool,
}

/// Mutable view over the entities combat may touch.
pub struct Battlefield<'a> {
    pub players: &'a mut BTreeMap<PlayerId, Player>,
    pub hostiles: &'a mut BTreeMap<HostileId, Hostile>,
    pub structures: &'a mut StructureGrid,
    pub projectiles: &'a mut ProjectileArena,
}

/// A kill the world still has to book (life state, stats, party score).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Casualty {
    Player {
        victim: PlayerId,
        killer: Option<PlayerId>,
    },
    Hostile {
        id: HostileId,
        party: PartyId,
        killer: Option<PlayerId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Dead, downed, immune, or fully mitigated.
    Ignored,
    Damaged { amount: f32 },
    Killed { amount: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerHit {
    /// Position along the swept segment, 0.0 at the previous position.
    pub t: f32,
    pub headshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ImpactTarget {
    Player { id: PlayerId, headshot: bool },
    Hostile(HostileId),
    Structure(TileKey),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Impact {
    t: f32,
    point: (f32, f32),
    target: ImpactTarget,
}

/// Whether a player can currently be hit at all.
pub fn targetable(player: &Player) -> bool {
    player.is_alive() && player.hp > 0.0
}

/// Teammates are protected from each other unless friendly fire is on.
pub fn same_team(a: &Player, b: &Player) -> bool {
    a.party.is_some() && a.party == b.party
}

/// Swept test of a projectile segment against a player's body and head volumes.
pub fn player_hit(
    from: (f32, f32),
    to: (f32, f32),
    projectile_radius: f32,
    player: &Player,
    tuning: &PlayerTuning,
) -> Option<PlayerHit> {
    let head = (player.x, player.y - tuning.head_offset);
    let (head_sq, head_t) = segment_point_distance_sq(from, to, head);
    let head_reach = tuning.head_radius + projectile_radius;
    if head_sq <= head_reach * head_reach {
        return Some(PlayerHit {
            t: head_t,
            headshot: true,
        });
    }

    let (body_sq, body_t) = segment_point_distance_sq(from, to, (player.x, player.y));
    let body_reach = tuning.radius + projectile_radius;
    (body_sq <= body_reach * body_reach).then_some(PlayerHit {
        t: body_t,
        headshot: false,
    })
}

/// Applies damage with mitigation and the post-hit immunity window.
pub fn damage_player(player: &mut Player, raw: f32, now: u64, tuning: &PlayerTuning) -> DamageOutcome {
    if !targetable(player) || now < player.immune_until {
        return DamageOutcome::Ignored;
    }
    let amount = player.mitigated(raw, now, tuning);
    if amount <= 0.0 {
        return DamageOutcome::Ignored;
    }

    player.hp = (player.hp - amount).max(0.0);
    player.immune_until = now + tuning.hit_immunity_ms;
    if player.hp <= 0.0 {
        DamageOutcome::Killed { amount }
    } else {
        DamageOutcome::Damaged { amount }
    }
}

/// Splash damage at `distance` from the impact, or `None` outside the radius.
pub fn splash_damage(base: f32, distance: f32, tuning: &ProjectileTuning) -> Option<f32> {
    if tuning.splash_radius <= 0.0 || distance >= tuning.splash_radius {
        return None;
    }
    let ratio = distance / tuning.splash_radius;
    Some(base * tuning.splash_multiplier * tuning.splash_falloff.factor(ratio))
}

/// Moves a killed player into `Downed` (revivable) or `Eliminated`.
pub fn knock_down(player: &mut Player, revivable: bool, now: u64, tuning: &GameTuning) -> WorldEvent {
    player.hp = 0.0;
    player.vx = 0.0;
    player.vy = 0.0;
    player.deaths += 1;
    if revivable {
        player.life = LifeState::Downed {
            bleed_out_at: now + tuning.combat.bleed_out_ms,
            revive: None,
        };
        WorldEvent::Downed {
            player_id: player.id,
        }
    } else {
        player.life = LifeState::Eliminated {
            respawn_at: Some(now + tuning.player.respawn_ms),
        };
        WorldEvent::Eliminated {
            player_id: player.id,
        }
    }
}

/// Advances every projectile one step and resolves what it touched.
pub fn resolve_projectiles(
    ctx: &CombatContext,
    field: &mut Battlefield,
    events: &mut Vec<WorldEvent>,
) -> Vec<Casualty> {
    let tuning = ctx.tuning;
    let mut casualties = Vec::new();
    let grid = build_broadphase(field, tuning);
    let reach = target_reach(tuning);

    for id in field.projectiles.ids() {
        let Some(current) = field.projectiles.get(id) else {
            continue;
        };
        let steer = match (current.flight, current.owner) {
            (FlightModel::Arc, Some(owner)) => field
                .players
                .get(&owner)
                .map(|p| (p.input.aim_x, p.input.aim_y)),
            _ => None,
        };

        let Some(projectile) = field.projectiles.get_mut(id) else {
            continue;
        };
        let outcome = projectile.step(ctx.dt, ctx.now, steer, &tuning.world, &tuning.projectile);
        let projectile = projectile.clone();

        if let Some(impact) = find_impact(&projectile, &grid, reach, field, tuning) {
            let reason = match impact.target {
                ImpactTarget::Player { .. } => RetireReason::HitPlayer,
                ImpactTarget::Hostile(_) => RetireReason::HitHostile,
                ImpactTarget::Structure(_) => RetireReason::HitStructure,
            };
            apply_impact(ctx, field, &grid, &projectile, impact, events, &mut casualties);
            retire(field.projectiles, id, ctx.tick, reason, events);
            continue;
        }

        match outcome {
            StepOutcome::Flying => {}
            StepOutcome::HitGround => {
                if let Some(owner) = projectile.owner {
                    detonate(
                        ctx,
                        field,
                        &grid,
                        (projectile.x, projectile.y),
                        owner,
                        projectile.damage,
                        None,
                        events,
                        &mut casualties,
                    );
                }
                retire(field.projectiles, id, ctx.tick, RetireReason::HitGround, events);
            }
            StepOutcome::Expired => {
                retire(field.projectiles, id, ctx.tick, RetireReason::Expired, events);
            }
            StepOutcome::OutOfBounds => {
                retire(field.projectiles, id, ctx.tick, RetireReason::OutOfBounds, events);
            }
        }
    }

    casualties
}

/// Hostiles chase the closest living member of their party and strike on contact.
pub fn resolve_hostiles(
    ctx: &CombatContext,
    players: &mut BTreeMap<PlayerId, Player>,
    hostiles: &mut BTreeMap<HostileId, Hostile>,
    events: &mut Vec<WorldEvent>,
) -> Vec<Casualty> {
    let tuning = ctx.tuning;
    let mut casualties = Vec::new();

    for hostile in hostiles.values_mut() {
        let target = players
            .values()
            .filter(|p| p.party == Some(hostile.party) && targetable(p))
            .min_by(|a, b| {
                a.distance_sq_to(hostile.x, hostile.y)
                    .total_cmp(&b.distance_sq_to(hostile.x, hostile.y))
            })
            .map(|p| (p.id, p.x, p.y));
        let Some((target_id, x, y)) = target else {
            continue;
        };

        let contact = hostile.advance_toward((x, y), tuning.player.radius, ctx.dt);
        if !contact || !hostile.try_attack(ctx.now, tuning.waves.attack_cooldown_ms) {
            continue;
        }
        let Some(player) = players.get_mut(&target_id) else {
            continue;
        };
        let damage = hostile.contact_damage;
        match damage_player(player, damage, ctx.now, &tuning.player) {
            DamageOutcome::Ignored => {}
            DamageOutcome::Damaged { amount } => events.push(WorldEvent::Hit {
                target: TargetRef::Player(target_id),
                attacker: None,
                damage: amount,
                headshot: false,
                splash: false,
            }),
            DamageOutcome::Killed { amount } => {
                events.push(WorldEvent::Hit {
                    target: TargetRef::Player(target_id),
                    attacker: None,
                    damage: amount,
                    headshot: false,
                    splash: false,
                });
                casualties.push(Casualty::Player {
                    victim: target_id,
                    killer: None,
                });
            }
        }
    }

    casualties
}

/// Advances revives and bleed-outs. Returns players who bled out this tick.
pub fn resolve_revives(
    now: u64,
    dt_ms: u64,
    players: &mut BTreeMap<PlayerId, Player>,
    tuning: &GameTuning,
    events: &mut Vec<WorldEvent>,
) -> Vec<PlayerId> {
    let radius_sq = tuning.combat.revive_radius * tuning.combat.revive_radius;
    let helpers: Vec<(PlayerId, Option<PartyId>, f32, f32)> = players
        .values()
        .filter(|p| targetable(p))
        .map(|p| (p.id, p.party, p.x, p.y))
        .collect();
    let mut bled_out = Vec::new();

    for player in players.values_mut() {
        let LifeState::Downed {
            bleed_out_at,
            revive,
        } = player.life
        else {
            continue;
        };

        if now >= bleed_out_at {
            if let Some(progress) = revive {
                events.push(WorldEvent::ReviveCancelled {
                    player_id: player.id,
                    reviver: progress.reviver,
                });
            }
            player.life = LifeState::Eliminated { respawn_at: None };
            events.push(WorldEvent::Eliminated {
                player_id: player.id,
            });
            bled_out.push(player.id);
            continue;
        }

        let in_range = |helper: &(PlayerId, Option<PartyId>, f32, f32)| {
            helper.1.is_some()
                && helper.1 == player.party
                && player.distance_sq_to(helper.2, helper.3) <= radius_sq
        };

        let mut next = revive;
        if let Some(progress) = revive {
            let still_here = helpers
                .iter()
                .any(|h| h.0 == progress.reviver && in_range(h));
            if still_here {
                next = Some(ReviveProgress {
                    reviver: progress.reviver,
                    elapsed_ms: progress.elapsed_ms + dt_ms,
                });
            } else {
                events.push(WorldEvent::ReviveCancelled {
                    player_id: player.id,
                    reviver: progress.reviver,
                });
                next = None;
            }
        }

        if next.is_none() {
            next = helpers
                .iter()
                .filter(|h| h.0 != player.id && in_range(h))
                .min_by(|a, b| {
                    player
                        .distance_sq_to(a.2, a.3)
                        .total_cmp(&player.distance_sq_to(b.2, b.3))
                })
                .map(|h| {
                    events.push(WorldEvent::ReviveStarted {
                        player_id: player.id,
                        reviver: h.0,
                    });
                    ReviveProgress {
                        reviver: h.0,
                        elapsed_ms: 0,
                    }
                });
        }

        match next {
            Some(progress) if progress.elapsed_ms >= tuning.combat.revive_ms => {
                let hp = player.max_hp * tuning.combat.revive_hp_fraction;
                player.revive_at((player.x, player.y), hp, now, 0);
                events.push(WorldEvent::Revived {
                    player_id: player.id,
                    reviver: progress.reviver,
                });
            }
            _ => {
                player.life = LifeState::Downed {
                    bleed_out_at,
                    revive: next,
                };
            }
        }
    }

    bled_out
}

/// Cancels every revive `player_id` takes part in, as reviver or as the downed player.
pub fn cancel_revives_involving(
    player_id: PlayerId,
    players: &mut BTreeMap<PlayerId, Player>,
    events: &mut Vec<WorldEvent>,
) {
    for player in players.values_mut() {
        if let LifeState::Downed {
            bleed_out_at,
            revive: Some(progress),
        } = player.life
            && (progress.reviver == player_id || player.id == player_id)
        {
            player.life = LifeState::Downed {
                bleed_out_at,
                revive: None,
            };
            events.push(WorldEvent::ReviveCancelled {
                player_id: player.id,
                reviver: progress.reviver,
            });
        }
    }
}

fn build_broadphase(field: &Battlefield, tuning: &GameTuning) -> SpatialGrid {
    let mut grid = SpatialGrid::new(tuning.player.radius * 4.0);
    for player in field.players.values().filter(|p| targetable(p)) {
        grid.insert(TargetRef::Player(player.id), player.x, player.y);
    }
    for hostile in field.hostiles.values() {
        grid.insert(TargetRef::Hostile(hostile.id), hostile.x, hostile.y);
    }
    grid
}

// Largest distance from an inserted centre at which a projectile can still connect.
fn target_reach(tuning: &GameTuning) -> f32 {
    let player = &tuning.player;
    player
        .radius
        .max(player.head_offset + player.head_radius)
        .max(tuning.waves.hostile_radius)
        + tuning.projectile.radius
}

fn find_impact(
    projectile: &Projectile,
    grid: &SpatialGrid,
    reach: f32,
    field: &Battlefield,
    tuning: &GameTuning,
) -> Option<Impact> {
    let from = (projectile.prev_x, projectile.prev_y);
    let to = (projectile.x, projectile.y);
    let radius = tuning.projectile.radius;
    let mut best: Option<Impact> = None;
    let mut consider = |candidate: Impact| {
        if best.is_none_or(|b| candidate.t < b.t) {
            best = Some(candidate);
        }
    };

    if let Some(owner_id) = projectile.owner {
        let owner = field.players.get(&owner_id);
        for target in grid.query_segment(from, to, reach) {
            match target {
                TargetRef::Player(id) => {
                    if id == owner_id {
                        continue;
                    }
                    let Some(victim) = field.players.get(&id) else {
                        continue;
                    };
                    if !targetable(victim) {
                        continue;
                    }
                    if let Some(owner) = owner
                        && same_team(owner, victim)
                        && !tuning.combat.friendly_fire
                    {
                        continue;
                    }
                    if let Some(hit) = player_hit(from, to, radius, victim, &tuning.player) {
                        consider(Impact {
                            t: hit.t,
                            point: lerp(from, to, hit.t),
                            target: ImpactTarget::Player {
                                id,
                                headshot: hit.headshot,
                            },
                        });
                    }
                }
                TargetRef::Hostile(id) => {
                    let Some(hostile) = field.hostiles.get(&id) else {
                        continue;
                    };
                    let (dist_sq, t) = segment_point_distance_sq(from, to, (hostile.x, hostile.y));
                    let hit_reach = hostile.radius + radius;
                    if dist_sq <= hit_reach * hit_reach {
                        consider(Impact {
                            t,
                            point: lerp(from, to, t),
                            target: ImpactTarget::Hostile(id),
                        });
                    }
                }
            }
        }
    }

    if let Some((key, point)) = field.structures.first_blocking(from, to) {
        let (_, t) = segment_point_distance_sq(from, to, point);
        // Cover wins ties against the target standing behind it.
        if best.is_none_or(|b| t <= b.t) {
            best = Some(Impact {
                t,
                point,
                target: ImpactTarget::Structure(key),
            });
        }
    }

    best
}

fn apply_impact(
    ctx: &CombatContext,
    field: &mut Battlefield,
    grid: &SpatialGrid,
    projectile: &Projectile,
    impact: Impact,
    events: &mut Vec<WorldEvent>,
    casualties: &mut Vec<Casualty>,
) {
    let tuning = ctx.tuning;
    if let ImpactTarget::Structure(key) = impact.target {
        // Ownerless projectiles are absorbed without wearing anything down.
        if projectile.owner.is_some() {
            damage_structure(field.structures, key, projectile.damage, ctx, events);
        }
    }

    let Some(owner) = projectile.owner else {
        return;
    };

    if projectile.flight == FlightModel::Arc {
        let direct = match impact.target {
            ImpactTarget::Player { id, .. } => Some(TargetRef::Player(id)),
            ImpactTarget::Hostile(id) => Some(TargetRef::Hostile(id)),
            ImpactTarget::Structure(_) => None,
        };
        detonate(
            ctx,
            field,
            grid,
            impact.point,
            owner,
            projectile.damage,
            direct,
            events,
            casualties,
        );
        return;
    }

    match impact.target {
        ImpactTarget::Player { id, headshot } => {
            let damage = if headshot {
                projectile.damage * tuning.combat.headshot_multiplier
            } else {
                projectile.damage
            };
            hit_player(ctx, field.players, id, owner, damage, headshot, false, events, casualties);
        }
        ImpactTarget::Hostile(id) => {
            hit_hostile(field.hostiles, id, owner, projectile.damage, false, events, casualties);
        }
        ImpactTarget::Structure(_) => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn detonate(
    ctx: &CombatContext,
    field: &mut Battlefield,
    grid: &SpatialGrid,
    centre: (f32, f32),
    owner: PlayerId,
    base_damage: f32,
    direct: Option<TargetRef>,
    events: &mut Vec<WorldEvent>,
    casualties: &mut Vec<Casualty>,
) {
    let tuning = ctx.tuning;
    events.push(WorldEvent::Explosion {
        x: centre.0,
        y: centre.1,
        radius: tuning.projectile.splash_radius,
    });

    match direct {
        Some(TargetRef::Player(id)) => {
            hit_player(ctx, field.players, id, owner, base_damage, false, false, events, casualties);
        }
        Some(TargetRef::Hostile(id)) => {
            hit_hostile(field.hostiles, id, owner, base_damage, false, events, casualties);
        }
        None => {}
    }

    let owner_party = field.players.get(&owner).and_then(|p| p.party);
    for target in grid.query_radius(centre.0, centre.1, tuning.projectile.splash_radius) {
        if Some(target) == direct {
            continue;
        }
        match target {
            TargetRef::Player(id) => {
                if id == owner {
                    continue;
                }
                let Some(victim) = field.players.get(&id) else {
                    continue;
                };
                if owner_party.is_some()
                    && victim.party == owner_party
                    && !tuning.combat.friendly_fire
                {
                    continue;
                }
                let distance = victim.distance_sq_to(centre.0, centre.1).sqrt();
                if let Some(damage) = splash_damage(base_damage, distance, &tuning.projectile) {
                    hit_player(ctx, field.players, id, owner, damage, false, true, events, casualties);
                }
            }
            TargetRef::Hostile(id) => {
                let Some(hostile) = field.hostiles.get(&id) else {
                    continue;
                };
                let (dx, dy) = (hostile.x - centre.0, hostile.y - centre.1);
                let distance = (dx * dx + dy * dy).sqrt();
                if let Some(damage) = splash_damage(base_damage, distance, &tuning.projectile) {
                    hit_hostile(field.hostiles, id, owner, damage, true, events, casualties);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn hit_player(
    ctx: &CombatContext,
    players: &mut BTreeMap<PlayerId, Player>,
    id: PlayerId,
    attacker: PlayerId,
    damage: f32,
    headshot: bool,
    splash: bool,
    events: &mut Vec<WorldEvent>,
    casualties: &mut Vec<Casualty>,
) {
    let Some(victim) = players.get_mut(&id) else {
        return;
    };
    let (amount, killed) = match damage_player(victim, damage, ctx.now, &ctx.tuning.player) {
        DamageOutcome::Ignored => return,
        DamageOutcome::Damaged { amount } => (amount, false),
        DamageOutcome::Killed { amount } => (amount, true),
    };
    events.push(WorldEvent::Hit {
        target: TargetRef::Player(id),
        attacker: Some(attacker),
        damage: amount,
        headshot,
        splash,
    });
    if killed {
        casualties.push(Casualty::Player {
            victim: id,
            killer: Some(attacker),
        });
    }
}

fn hit_hostile(
    hostiles: &mut BTreeMap<HostileId, Hostile>,
    id: HostileId,
    attacker: PlayerId,
    damage: f32,
    splash: bool,
    events: &mut Vec<WorldEvent>,
    casualties: &mut Vec<Casualty>,
) {
    let Some(hostile) = hostiles.get_mut(&id) else {
        return;
    };
    let died = hostile.take_damage(damage);
    let party = hostile.party;
    events.push(WorldEvent::Hit {
        target: TargetRef::Hostile(id),
        attacker: Some(attacker),
        damage,
        headshot: false,
        splash,
    });
    if died {
        hostiles.remove(&id);
        events.push(WorldEvent::Killed {
            victim: TargetRef::Hostile(id),
            killer: Some(attacker),
        });
        casualties.push(Casualty::Hostile {
            id,
            party,
            killer: Some(attacker),
        });
    }
}

fn damage_structure(
    structures: &mut StructureGrid,
    key: TileKey,
    damage: f32,
    ctx: &CombatContext,
    events: &mut Vec<WorldEvent>,
) {
    match structures.damage(key, damage, ctx.destructible_structures) {
        StructureHit::Absorbed => {}
        StructureHit::Damaged { hp } => events.push(WorldEvent::StructureDamaged { key, hp }),
        StructureHit::Destroyed => events.push(WorldEvent::StructureDestroyed { key }),
    }
}

fn retire(
    projectiles: &mut ProjectileArena,
    id: ProjectileId,
    tick: u64,
    reason: RetireReason,
    events: &mut Vec<WorldEvent>,
) {
    if projectiles.remove(id, tick).is_some() {
        events.push(WorldEvent::ProjectileRetired { id, reason });
    }
}

fn lerp(from: (f32, f32), to: (f32, f32), t: f32) -> (f32, f32) {
    (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::{PlayerProfile, Role};
    use crate::domain::projectile::SpawnParams;
    use crate::domain::structures::StructureKind;
    use crate::domain::weapon::WeaponKind;

    fn player(id: PlayerId, x: f32, y: f32, tuning: &GameTuning) -> Player {
        let profile = PlayerProfile::new_default(id, Role::Player, &tuning.player);
        let mut p = Player::spawn(id, id, format!("p{id}"), Role::Player, &profile, (x, y), 0, &tuning.player);
        p.shield_until = 0;
        p
    }

    fn shot(owner: PlayerId, weapon: WeaponKind, flight: FlightModel, origin: (f32, f32), damage: f32) -> SpawnParams {
        SpawnParams {
            owner,
            weapon,
            flight,
            origin,
            angle: 0.0,
            speed: 600.0,
            damage,
            ttl_ms: 5000,
            client_shot_id: None,
        }
    }

    struct Scene {
        tuning: GameTuning,
        players: BTreeMap<PlayerId, Player>,
        hostiles: BTreeMap<HostileId, Hostile>,
        structures: StructureGrid,
        projectiles: ProjectileArena,
        destructible: bool,
    }

    impl Scene {
        fn new(tuning: GameTuning) -> Self {
            let structures = StructureGrid::new(&tuning.structures);
            Self {
                tuning,
                players: BTreeMap::new(),
                hostiles: BTreeMap::new(),
                structures,
                projectiles: ProjectileArena::new(5),
                destructible: false,
            }
        }

        fn add_player(&mut self, id: PlayerId, x: f32, y: f32) {
            let p = player(id, x, y, &self.tuning);
            self.players.insert(id, p);
        }

        fn player_mut(&mut self, id: PlayerId) -> &mut Player {
            self.players.get_mut(&id).expect("player should exist")
        }

        fn step(&mut self, now: u64) -> (Vec<WorldEvent>, Vec<Casualty>) {
            let ctx = CombatContext {
                now,
                tick: now / 100,
                dt: 0.1,
                tuning: &self.tuning,
                destructible_structures: self.destructible,
            };
            let mut field = Battlefield {
                players: &mut self.players,
                hostiles: &mut self.hostiles,
                structures: &mut self.structures,
                projectiles: &mut self.projectiles,
            };
            let mut events = Vec::new();
            let casualties = resolve_projectiles(&ctx, &mut field, &mut events);
            (events, casualties)
        }
    }

    #[test]
    fn when_fast_projectile_crosses_player_between_ticks_then_swept_test_hits() {
        let mut scene = Scene::new(GameTuning::default());
        scene.add_player(1, 100.0, 1000.0);
        scene.add_player(2, 130.0, 1000.0);
        scene
            .projectiles
            .spawn(shot(1, WeaponKind::Pistol, FlightModel::Straight, (101.0, 1000.0), 20.0), 0, 0);

        let (events, _) = scene.step(100);
        assert_eq!(scene.players[&2].hp, 80.0);
        assert!(scene.projectiles.is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            WorldEvent::ProjectileRetired { reason: RetireReason::HitPlayer, .. }
        )));
    }

    #[test]
    fn when_projectile_has_no_owner_then_it_passes_through_players() {
        let mut scene = Scene::new(GameTuning::default());
        scene.add_player(2, 130.0, 1000.0);
        let id = scene
            .projectiles
            .spawn(shot(1, WeaponKind::Pistol, FlightModel::Straight, (101.0, 1000.0), 20.0), 0, 0);
        scene.projectiles.orphan(1);

        scene.step(100);
        assert_eq!(scene.players[&2].hp, 100.0);
        assert!(scene.projectiles.get(id).is_some());
    }

    #[test]
    fn when_two_projectiles_hit_in_same_tick_then_immunity_blocks_the_second() {
        let mut scene = Scene::new(GameTuning::default());
        scene.add_player(1, 100.0, 1000.0);
        scene.add_player(2, 130.0, 1000.0);
        for _ in 0..2 {
            scene
                .projectiles
                .spawn(shot(1, WeaponKind::Pistol, FlightModel::Straight, (101.0, 1000.0), 20.0), 0, 0);
        }

        scene.step(100);
        assert_eq!(scene.players[&2].hp, 80.0);
        assert!(scene.projectiles.is_empty());
    }

    #[test]
    fn when_rocket_detonates_then_direct_hit_takes_full_and_bystander_half() {
        let mut tuning = GameTuning::default();
        tuning.projectile.arc_gravity = 0.0;
        let mut scene = Scene::new(tuning);
        scene.add_player(1, 100.0, 1000.0);
        scene.add_player(2, 160.0, 1000.0);
        scene.add_player(3, 160.0, 1080.0);
        scene.player_mut(1).input.aim_x = 3000.0;
        scene.player_mut(1).input.aim_y = 1000.0;
        scene.player_mut(2).max_hp = 500.0;
        scene.player_mut(2).hp = 500.0;
        scene.player_mut(3).hp = 500.0;
        scene
            .projectiles
            .spawn(shot(1, WeaponKind::RocketLauncher, FlightModel::Arc, (101.0, 1000.0), 200.0), 0, 0);

        let (events, _) = scene.step(100);
        assert_eq!(scene.players[&2].hp, 300.0);
        assert_eq!(scene.players[&3].hp, 400.0);
        assert_eq!(scene.players[&1].hp, 100.0);
        assert!(events.iter().any(|e| matches!(e, WorldEvent::Explosion { .. })));
    }

    #[test]
    fn when_platform_is_in_the_way_then_projectile_passes_but_wall_absorbs() {
        let mut scene = Scene::new(GameTuning::default());
        let structures = scene.tuning.structures.clone();
        scene
            .structures
            .place(9, (660.0, 660.0), StructureKind::Platform, TileKey { x: 640, y: 640 }, &structures)
            .expect("platform");
        let id = scene
            .projectiles
            .spawn(shot(1, WeaponKind::Pistol, FlightModel::Straight, (600.0, 660.0), 20.0), 0, 0);
        scene.step(100);
        assert!(scene.projectiles.get(id).is_some());

        scene
            .structures
            .place(9, (740.0, 660.0), StructureKind::Wall, TileKey { x: 720, y: 640 }, &structures)
            .expect("wall");
        scene.step(200);
        assert!(scene.projectiles.get(id).is_none());
    }

    #[test]
    fn when_shooter_and_victim_share_a_party_then_friendly_fire_is_off_by_default() {
        let mut scene = Scene::new(GameTuning::default());
        scene.add_player(1, 100.0, 1000.0);
        scene.add_player(2, 130.0, 1000.0);
        scene.player_mut(1).party = Some(4);
        scene.player_mut(2).party = Some(4);
        scene
            .projectiles
            .spawn(shot(1, WeaponKind::Pistol, FlightModel::Straight, (101.0, 1000.0), 20.0), 0, 0);

        scene.step(100);
        assert_eq!(scene.players[&2].hp, 100.0);
    }

    #[test]
    fn when_shield_is_up_then_damage_is_ignored_and_no_immunity_is_granted() {
        let tuning = GameTuning::default();
        let mut p = player(1, 0.0, 0.0, &tuning);
        p.shield_until = 1000;
        assert_eq!(damage_player(&mut p, 50.0, 10, &tuning.player), DamageOutcome::Ignored);
        assert_eq!(p.immune_until, 0);
        assert_eq!(
            damage_player(&mut p, 150.0, 1000, &tuning.player),
            DamageOutcome::Killed { amount: 150.0 }
        );
        assert_eq!(p.hp, 0.0);
    }

    #[test]
    fn when_falloff_is_linear_then_splash_fades_with_distance() {
        let mut tuning = ProjectileTuning::default();
        assert_eq!(splash_damage(200.0, 60.0, &tuning), Some(100.0));
        assert_eq!(splash_damage(200.0, tuning.splash_radius, &tuning), None);
        tuning.splash_falloff = crate::domain::tuning::SplashFalloff::Linear;
        assert_eq!(splash_damage(200.0, 60.0, &tuning), Some(50.0));
    }

    #[test]
    fn when_teammate_stays_close_then_downed_player_is_revived() {
        let tuning = GameTuning::default();
        let mut players = BTreeMap::new();
        let mut downed = player(1, 100.0, 100.0, &tuning);
        downed.party = Some(1);
        knock_down(&mut downed, true, 0, &tuning);
        let mut helper = player(2, 120.0, 100.0, &tuning);
        helper.party = Some(1);
        players.insert(1, downed);
        players.insert(2, helper);

        let mut events = Vec::new();
        let mut now = 0;
        while now <= tuning.combat.revive_ms + 100 {
            now += 100;
            resolve_revives(now, 100, &mut players, &tuning, &mut events);
        }
        assert!(players[&1].is_alive());
        assert_eq!(players[&1].hp, 50.0);
        assert!(events.iter().any(|e| matches!(e, WorldEvent::Revived { .. })));
    }

    #[test]
    fn when_reviver_walks_away_then_progress_is_cancelled() {
        let tuning = GameTuning::default();
        let mut players = BTreeMap::new();
        let mut downed = player(1, 100.0, 100.0, &tuning);
        downed.party = Some(1);
        knock_down(&mut downed, true, 0, &tuning);
        let mut helper = player(2, 120.0, 100.0, &tuning);
        helper.party = Some(1);
        players.insert(1, downed);
        players.insert(2, helper);

        let mut events = Vec::new();
        resolve_revives(100, 100, &mut players, &tuning, &mut events);
        players.get_mut(&2).expect("helper").x = 900.0;
        resolve_revives(200, 100, &mut players, &tuning, &mut events);

        assert!(events.iter().any(|e| matches!(e, WorldEvent::ReviveCancelled { reviver: 2, .. })));
        assert!(matches!(players[&1].life, LifeState::Downed { revive: None, .. }));
    }

    #[test]
    fn when_shot_crosses_the_head_then_hit_is_flagged_as_headshot() {
        let mut scene = Scene::new(GameTuning::default());
        scene.add_player(1, 100.0, 1000.0);
        scene.add_player(2, 130.0, 1000.0);
        let head_y = 1000.0 - scene.tuning.player.head_offset;
        scene
            .projectiles
            .spawn(shot(1, WeaponKind::Pistol, FlightModel::Straight, (101.0, head_y), 20.0), 0, 0);

        let (events, _) = scene.step(100);
        assert!(events.contains(&WorldEvent::Hit {
            target: TargetRef::Player(2),
            attacker: Some(1),
            damage: 20.0,
            headshot: true,
            splash: false,
        }));
        assert_eq!(scene.players[&2].hp, 80.0);
    }

    #[test]
    fn when_hostile_reaches_its_party_then_contact_damage_respects_cooldown() {
        let tuning = GameTuning::default();
        let definition = tuning.waves.definition(1);
        let mut players = BTreeMap::new();
        let mut target = player(1, 100.0, 100.0, &tuning);
        target.party = Some(3);
        players.insert(1, target);
        players.insert(2, player(2, 110.0, 100.0, &tuning));
        let mut hostiles = BTreeMap::new();
        hostiles.insert(7, Hostile::spawn(7, 3, (130.0, 100.0), &definition, &tuning.waves));

        let mut events = Vec::new();
        for now in [100, 200] {
            let ctx = CombatContext {
                now,
                tick: now / 100,
                dt: 0.1,
                tuning: &tuning,
                destructible_structures: false,
            };
            resolve_hostiles(&ctx, &mut players, &mut hostiles, &mut events);
        }

        assert_eq!(players[&1].hp, 100.0 - tuning.waves.contact_damage);
        assert_eq!(players[&2].hp, 100.0);
        let hits: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, WorldEvent::Hit { attacker: None, .. }))
            .collect();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn when_structures_are_destructible_then_shots_wear_walls_down() {
        let mut scene = Scene::new(GameTuning::default());
        scene.destructible = true;
        let structures = scene.tuning.structures.clone();
        let key = TileKey { x: 720, y: 640 };
        scene
            .structures
            .place(9, (740.0, 660.0), StructureKind::Wall, key, &structures)
            .expect("wall");
        scene
            .projectiles
            .spawn(shot(1, WeaponKind::Pistol, FlightModel::Straight, (670.0, 660.0), 20.0), 0, 0);

        let (events, _) = scene.step(100);
        let hp = structures.wall_hp - 20.0;
        assert!(events.contains(&WorldEvent::StructureDamaged { key, hp }));
        assert_eq!(scene.structures.get(key).map(|c| c.hp), Some(hp));
        assert!(scene.projectiles.is_empty());
    }

    #[test]
    fn when_rocket_reaches_the_ground_then_it_detonates_there() {
        let mut tuning = GameTuning::default();
        tuning.projectile.arc_gravity = 0.0;
        let ground = tuning.world.height;
        let mut scene = Scene::new(tuning);
        scene.add_player(2, 1050.0, ground - 30.0);
        scene.player_mut(2).max_hp = 500.0;
        scene.player_mut(2).hp = 500.0;
        let mut rocket = shot(1, WeaponKind::RocketLauncher, FlightModel::Arc, (1000.0, ground - 10.0), 200.0);
        rocket.angle = std::f32::consts::FRAC_PI_2;
        let id = scene.projectiles.spawn(rocket, 0, 0);

        let (events, _) = scene.step(100);
        assert!(events.contains(&WorldEvent::ProjectileRetired {
            id,
            reason: RetireReason::HitGround,
        }));
        assert!(events.iter().any(|e| matches!(e, WorldEvent::Explosion { .. })));
        assert_eq!(scene.players[&2].hp, 400.0);
    }

    #[test]
    fn when_downed_player_leaves_then_their_revive_is_cancelled_too() {
        let tuning = GameTuning::default();
        let mut players = BTreeMap::new();
        let mut downed = player(1, 100.0, 100.0, &tuning);
        downed.life = LifeState::Downed {
            bleed_out_at: 10_000,
            revive: Some(ReviveProgress {
                reviver: 2,
                elapsed_ms: 400,
            }),
        };
        players.insert(1, downed);

        let mut events = Vec::new();
        cancel_revives_involving(1, &mut players, &mut events);
        assert_eq!(
            events,
            vec![WorldEvent::ReviveCancelled {
                player_id: 1,
                reviver: 2
            }]
        );
        assert!(matches!(players[&1].life, LifeState::Downed { revive: None, .. }));
    }

    #[test]
    fn when_bleed_out_expires_then_player_is_eliminated_without_respawn() {
        let tuning = GameTuning::default();
        let mut players = BTreeMap::new();
        let mut downed = player(1, 100.0, 100.0, &tuning);
        knock_down(&mut downed, true, 0, &tuning);
        players.insert(1, downed);

        let mut events = Vec::new();
        let bled = resolve_revives(tuning.combat.bleed_out_ms, 100, &mut players, &tuning, &mut events);
        assert_eq!(bled, vec![1]);
        assert_eq!(players[&1].life, LifeState::Eliminated { respawn_at: None });
    }
}
