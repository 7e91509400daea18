// Authoritative world state and the fixed-order tick.
//
// Everything here is synchronous and deterministic: world time advances by exactly one tick
// interval per step and spawn positions come from a seeded RNG, so replaying the same
// command stream reproduces the same world.

use crate::domain::combat::{self, Battlefield, Casualty, CombatContext};
use crate::domain::commands::{ChatCommand, Command, PartyCommand, parse_chat};
use crate::domain::errors::RejectReason;
use crate::domain::events::{Rejection, RetireReason, WorldEvent};
use crate::domain::hostile::{Hostile, HostileId};
use crate::domain::party::{PartyBook, WaveDirective};
use crate::domain::player::{LifeState, PartyId, Player, PlayerId, PlayerInput, PlayerProfile, Role};
use crate::domain::projectile::{ProjectileArena, SpawnParams, spread_angles};
use crate::domain::snapshot::{
    HostileSnapshot, LifeView, PartySnapshot, PlayerSnapshot, ProjectileSnapshot,
    StructureListing, StructureSnapshot, WeaponView, WorldSnapshot,
};
use crate::domain::spatial::TargetRef;
use crate::domain::structures::StructureGrid;
use crate::domain::tuning::GameTuning;
use crate::domain::weapon::{WeaponInstance, WeaponKey, WeaponKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldMode {
    /// Free-for-all; structures are indestructible.
    #[default]
    Versus,
    /// Party runs against hostiles; structures take damage.
    Coop,
}

#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub mode: WorldMode,
    pub seed: u64,
    pub tick_ms: u64,
}

/// Identity handed over by the session layer once auth has succeeded.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub player_id: PlayerId,
    pub conn_token: u64,
    pub display_name: String,
    pub session_role: Role,
}

/// Persistence work the world asks its host to perform off-tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileRequest {
    Load { player_id: PlayerId },
    Save(PlayerProfile),
}

/// Everything a tick produced besides the snapshot.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub rejections: Vec<Rejection>,
    pub profile_requests: Vec<ProfileRequest>,
    pub announcements: Vec<String>,
    /// Set when the structure grid changed this tick.
    pub structures_changed: bool,
}

pub struct WorldState {
    config: WorldConfig,
    tuning: Arc<GameTuning>,
    tick: u64,
    now: u64,
    rng: ChaCha8Rng,
    players: BTreeMap<PlayerId, Player>,
    weapons: BTreeMap<WeaponKey, WeaponInstance>,
    projectiles: ProjectileArena,
    structures: StructureGrid,
    hostiles: BTreeMap<HostileId, Hostile>,
    next_hostile_id: HostileId,
    parties: PartyBook,
    events: Vec<WorldEvent>,
    outbox: TickOutput,
}

impl WorldState {
    pub fn new(config: WorldConfig, tuning: Arc<GameTuning>) -> Self {
        let structures = StructureGrid::new(&tuning.structures);
        Self {
            config,
            projectiles: ProjectileArena::new(tuning.projectile.id_reuse_delay_ticks),
            tuning,
            tick: 0,
            now: 0,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            players: BTreeMap::new(),
            weapons: BTreeMap::new(),
            structures,
            hostiles: BTreeMap::new(),
            next_hostile_id: 0,
            parties: PartyBook::new(),
            events: Vec::new(),
            outbox: TickOutput::default(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn mode(&self) -> WorldMode {
        self.config.mode
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn weapon(&self, owner: PlayerId, kind: WeaponKind) -> Option<WeaponInstance> {
        self.weapons
            .get(&WeaponKey { owner, kind })
            .map(|w| w.refreshed(self.now))
    }

    pub fn projectiles(&self) -> &ProjectileArena {
        &self.projectiles
    }

    pub fn structures(&self) -> &StructureGrid {
        &self.structures
    }

    pub fn parties(&self) -> &PartyBook {
        &self.parties
    }

    pub fn hostile_count(&self) -> usize {
        self.hostiles.len()
    }

    /// Spawns a player, or rebinds an existing one to a newer connection.
    pub fn join(&mut self, request: JoinRequest) {
        if let Some(existing) = self.players.get_mut(&request.player_id) {
            existing.conn_token = request.conn_token;
            existing.session_role = request.session_role;
            existing.role = existing.role.max(request.session_role);
            return;
        }

        let profile = PlayerProfile::new_default(request.player_id, Role::Player, &self.tuning.player);
        let position = self.spawn_point();
        let player = Player::spawn(
            request.player_id,
            request.conn_token,
            request.display_name.clone(),
            request.session_role,
            &profile,
            position,
            self.now,
            &self.tuning.player,
        );
        self.players.insert(request.player_id, player);
        self.equip_first_allowed(request.player_id);
        self.events.push(WorldEvent::PlayerJoined {
            player_id: request.player_id,
            display_name: request.display_name,
        });
        self.outbox.profile_requests.push(ProfileRequest::Load {
            player_id: request.player_id,
        });
    }

    /// Removes a player. A leave from a replaced connection is ignored.
    pub fn leave(&mut self, player_id: PlayerId, conn_token: u64) -> bool {
        match self.players.get(&player_id) {
            Some(player) if player.conn_token == conn_token => {}
            _ => return false,
        }

        combat::cancel_revives_involving(player_id, &mut self.players, &mut self.events);
        if let Ok(departure) = self.parties.leave(player_id)
            && departure.destroyed
        {
            self.clear_hostiles(departure.party);
        }
        self.projectiles.orphan(player_id);
        self.structures.forget_player(player_id);
        self.weapons.retain(|key, _| key.owner != player_id);

        if let Some(player) = self.players.remove(&player_id) {
            self.outbox
                .profile_requests
                .push(ProfileRequest::Save(player.profile()));
        }
        self.events.push(WorldEvent::PlayerLeft { player_id });
        true
    }

    pub fn profile_loaded(&mut self, player_id: PlayerId, profile: PlayerProfile) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.apply_profile(&profile, &self.tuning.player);
        let levels: Vec<(WeaponKind, u8)> = WeaponKind::ALL
            .iter()
            .map(|&kind| (kind, player.weapon_level(kind)))
            .collect();
        for (kind, level) in levels {
            let key = WeaponKey {
                owner: player_id,
                kind,
            };
            if let Some(instance) = self.weapons.get_mut(&key)
                && instance.level != level
            {
                *instance = instance.with_level(level, &self.tuning.weapons);
            }
        }
        self.ensure_equipped_allowed(player_id);
    }

    pub fn set_input(&mut self, player_id: PlayerId, input: PlayerInput) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        match input.sanitized(&self.tuning.world) {
            Some(clean) => player.input = clean,
            None => {
                player.input.move_x = 0.0;
                player.input.move_y = 0.0;
            }
        }
    }

    /// Malformed input: the player stops moving but keeps aiming where it did.
    pub fn clear_movement(&mut self, player_id: PlayerId) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.input.move_x = 0.0;
            player.input.move_y = 0.0;
        }
    }

    /// Runs one tick: actions (already ordered, at most one per player) first, then the
    /// simulation in a fixed order, then the snapshot.
    pub fn step(&mut self, actions: Vec<(PlayerId, Command)>) -> (WorldSnapshot, TickOutput) {
        self.tick += 1;
        self.now += self.config.tick_ms;
        let dt = self.config.tick_ms as f32 / 1000.0;

        for (player_id, command) in actions {
            let action = command.action();
            if let Err(reason) = self.apply(player_id, command) {
                self.outbox.rejections.push(Rejection {
                    player_id,
                    action,
                    reason,
                });
            }
        }

        self.move_players(dt);
        self.respawn_due();

        let tuning = Arc::clone(&self.tuning);
        let ctx = CombatContext {
            now: self.now,
            tick: self.tick,
            dt,
            tuning: &tuning,
            destructible_structures: self.config.mode == WorldMode::Coop,
        };
        let mut casualties = {
            let mut field = Battlefield {
                players: &mut self.players,
                hostiles: &mut self.hostiles,
                structures: &mut self.structures,
                projectiles: &mut self.projectiles,
            };
            combat::resolve_projectiles(&ctx, &mut field, &mut self.events)
        };
        casualties.extend(combat::resolve_hostiles(
            &ctx,
            &mut self.players,
            &mut self.hostiles,
            &mut self.events,
        ));
        self.book_casualties(casualties);

        let bled_out = combat::resolve_revives(
            self.now,
            self.config.tick_ms,
            &mut self.players,
            &tuning,
            &mut self.events,
        );
        let mut directives = Vec::new();
        for player_id in bled_out {
            let party = self.players.get(&player_id).and_then(|p| p.party);
            if let Some(party) = party.and_then(|id| self.parties.get_mut(id)) {
                party.lose_life(&mut self.events, &mut directives);
            }
        }
        self.advance_parties(&mut directives);
        self.run_directives(directives);

        let snapshot = self.snapshot();
        let mut output = std::mem::take(&mut self.outbox);
        output.structures_changed = snapshot.structures.is_some();
        (snapshot, output)
    }

    /// Full structure list for joining or lagging clients.
    pub fn structure_listing(&self) -> StructureListing {
        StructureListing {
            revision: self.structures.revision(),
            cells: self
                .structures
                .cells()
                .map(|(key, cell)| StructureSnapshot {
                    key: *key,
                    kind: cell.kind,
                    owner: cell.owner,
                    hp: cell.hp,
                })
                .collect(),
        }
    }

    fn apply(&mut self, player_id: PlayerId, command: Command) -> Result<(), RejectReason> {
        // Commands from players that already left are stale, not errors.
        if !self.players.contains_key(&player_id) {
            return Ok(());
        }
        match command {
            Command::Fire {
                angle,
                client_shot_id,
            } => self.fire(player_id, angle, client_shot_id),
            Command::Reload => self.reload(player_id),
            Command::SwitchWeapon { slot } => self.switch_weapon(player_id, slot),
            Command::PlaceStructure { kind, key } => {
                let player = self.alive_player(player_id)?;
                let position = (player.x, player.y);
                self.structures
                    .place(player_id, position, kind, key, &self.tuning.structures)
            }
            Command::DeleteStructure { key } => {
                let role = self.players.get(&player_id).map_or(Role::Player, |p| p.role);
                self.structures
                    .remove(player_id, role, key, self.now, &self.tuning.structures)
                    .map(|_| ())
            }
            Command::RetireProjectile { id } => {
                let owned = self
                    .projectiles
                    .get(id)
                    .is_some_and(|p| p.owner == Some(player_id));
                if owned && self.projectiles.remove(id, self.tick).is_some() {
                    self.events.push(WorldEvent::ProjectileRetired {
                        id,
                        reason: RetireReason::Retired,
                    });
                }
                Ok(())
            }
            Command::Party(command) => self.party_command(player_id, command),
            Command::Chat { text } => self.chat(player_id, &text),
        }
    }

    fn alive_player(&self, player_id: PlayerId) -> Result<&Player, RejectReason> {
        self.players
            .get(&player_id)
            .filter(|p| p.is_alive())
            .ok_or(RejectReason::NotAlive)
    }

    fn fire(
        &mut self,
        player_id: PlayerId,
        angle: f32,
        client_shot_id: Option<u32>,
    ) -> Result<(), RejectReason> {
        if !angle.is_finite() {
            return Err(RejectReason::InvalidArgument);
        }
        let player = self.alive_player(player_id)?;
        let kind = player.equipped.ok_or(RejectReason::NoWeaponEquipped)?;
        let origin = (player.x, player.y);
        let key = WeaponKey {
            owner: player_id,
            kind,
        };
        let weapons = &self.tuning.weapons;
        let instance = self
            .weapons
            .get(&key)
            .copied()
            .ok_or(RejectReason::NoWeaponEquipped)?;
        let fired = instance.fire(self.now, weapons)?;
        self.weapons.insert(key, fired);

        let spec = weapons.spec(kind);
        let speed = weapons.bullet_speed(kind, fired.level);
        let damage = weapons.damage(kind, fired.level);
        for pellet_angle in spread_angles(angle, spec.pellets, spec.spread_deg) {
            let params = SpawnParams {
                owner: player_id,
                weapon: kind,
                flight: spec.flight,
                origin,
                angle: pellet_angle,
                speed,
                damage,
                ttl_ms: spec.ttl_ms,
                client_shot_id,
            };
            let id = self.projectiles.spawn(params, self.now, self.tick);
            if let Some(projectile) = self.projectiles.get(id) {
                self.events.push(WorldEvent::ProjectileSpawned {
                    id,
                    owner: player_id,
                    weapon: kind,
                    x: projectile.x,
                    y: projectile.y,
                    vx: projectile.vx,
                    vy: projectile.vy,
                    client_shot_id,
                });
            }
        }
        Ok(())
    }

    fn reload(&mut self, player_id: PlayerId) -> Result<(), RejectReason> {
        let player = self.alive_player(player_id)?;
        let kind = player.equipped.ok_or(RejectReason::NoWeaponEquipped)?;
        let key = WeaponKey {
            owner: player_id,
            kind,
        };
        let instance = self
            .weapons
            .get(&key)
            .copied()
            .ok_or(RejectReason::NoWeaponEquipped)?;
        let reloading = instance.start_reload(self.now, &self.tuning.weapons)?;
        self.weapons.insert(key, reloading);
        Ok(())
    }

    fn switch_weapon(&mut self, player_id: PlayerId, slot: usize) -> Result<(), RejectReason> {
        let player = self
            .players
            .get(&player_id)
            .ok_or(RejectReason::NotAlive)?;
        let kind = player
            .inventory
            .get(slot)
            .copied()
            .ok_or(RejectReason::InvalidArgument)?
            .ok_or(RejectReason::EmptySlot)?;
        if !self.tuning.weapons.allows(player.role, kind) {
            return Err(RejectReason::WeaponLocked);
        }
        self.equip(player_id, kind);
        Ok(())
    }

    // Weapon instances are created on first equip and kept until the owner leaves.
    fn equip(&mut self, player_id: PlayerId, kind: WeaponKind) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.equipped = Some(kind);
        let level = player.weapon_level(kind);
        let weapons = &self.tuning.weapons;
        self.weapons
            .entry(WeaponKey {
                owner: player_id,
                kind,
            })
            .or_insert_with_key(|key| WeaponInstance::new(*key, level, weapons));
    }

    fn equip_first_allowed(&mut self, player_id: PlayerId) {
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        let first = player
            .inventory
            .iter()
            .flatten()
            .copied()
            .find(|&kind| self.tuning.weapons.allows(player.role, kind));
        match first {
            Some(kind) => self.equip(player_id, kind),
            None => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.equipped = None;
                }
            }
        }
    }

    fn ensure_equipped_allowed(&mut self, player_id: PlayerId) {
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        let still_valid = player.equipped.is_some_and(|kind| {
            player.inventory.contains(&Some(kind)) && self.tuning.weapons.allows(player.role, kind)
        });
        if !still_valid {
            self.equip_first_allowed(player_id);
        }
    }

    fn party_command(&mut self, player_id: PlayerId, command: PartyCommand) -> Result<(), RejectReason> {
        match command {
            PartyCommand::Create => {
                let id = self.parties.create(player_id)?;
                self.set_party(player_id, Some(id));
            }
            PartyCommand::Join { party_id } => {
                self.parties
                    .join(player_id, party_id, self.tuning.party.max_members)?;
                self.set_party(player_id, Some(party_id));
            }
            PartyCommand::Leave => {
                let departure = self.parties.leave(player_id)?;
                combat::cancel_revives_involving(player_id, &mut self.players, &mut self.events);
                self.set_party(player_id, None);
                if departure.destroyed {
                    self.clear_hostiles(departure.party);
                }
            }
            PartyCommand::SetOpen { open } => {
                self.parties.set_open(player_id, open)?;
            }
            PartyCommand::StartRun => {
                self.parties.start_run(player_id, self.now, &self.tuning)?;
            }
            PartyCommand::Disband => {
                let (party, members) = self.parties.disband(player_id)?;
                for member in members {
                    self.set_party(member, None);
                }
                self.clear_hostiles(party);
            }
        }
        Ok(())
    }

    fn set_party(&mut self, player_id: PlayerId, party: Option<PartyId>) {
        let respawn_ms = self.tuning.player.respawn_ms;
        let now = self.now;
        if let Some(player) = self.players.get_mut(&player_id) {
            player.party = party;
            // Out of the run: a downed or waiting player falls back to free-play respawn.
            if party.is_none() && !player.is_alive() {
                player.life = LifeState::Eliminated {
                    respawn_at: Some(now + respawn_ms),
                };
            }
        }
    }

    fn chat(&mut self, player_id: PlayerId, text: &str) -> Result<(), RejectReason> {
        let command = parse_chat(text)?;
        let role = self
            .players
            .get(&player_id)
            .map_or(Role::Player, |p| p.role);
        if role < command.required_role() {
            return Err(RejectReason::NotAuthorized);
        }

        match command {
            ChatCommand::Say(text) => {
                self.events.push(WorldEvent::Chat { player_id, text });
            }
            ChatCommand::SetRole { target, role } => {
                if role == Role::Owner {
                    return Err(RejectReason::NotAuthorized);
                }
                let player = self
                    .players
                    .get_mut(&target)
                    .ok_or(RejectReason::InvalidArgument)?;
                player.role = role.max(player.session_role);
                let effective = player.role;
                let profile = player.profile();
                self.events.push(WorldEvent::RoleChanged {
                    player_id: target,
                    role: effective,
                });
                self.outbox.profile_requests.push(ProfileRequest::Save(profile));
                self.ensure_equipped_allowed(target);
            }
            ChatCommand::Announce(text) => {
                self.outbox.announcements.push(text);
            }
            ChatCommand::ResetGrid => {
                let removed = self.structures.reset();
                self.events.push(WorldEvent::GridReset { removed });
            }
            ChatCommand::SetLevel { weapon, level } => {
                let level = self.tuning.weapons.clamp_level(level);
                let player = self
                    .players
                    .get_mut(&player_id)
                    .ok_or(RejectReason::InvalidArgument)?;
                player.weapon_levels.insert(weapon, level);
                let profile = player.profile();
                let key = WeaponKey {
                    owner: player_id,
                    kind: weapon,
                };
                if let Some(instance) = self.weapons.get_mut(&key) {
                    *instance = instance.with_level(level, &self.tuning.weapons);
                }
                self.events.push(WorldEvent::WeaponLevelChanged {
                    player_id,
                    weapon,
                    level,
                });
                self.outbox.profile_requests.push(ProfileRequest::Save(profile));
            }
            ChatCommand::Tutorial => {
                if let Some(player) = self.players.get_mut(&player_id)
                    && !player.tutorial_seen
                {
                    player.tutorial_seen = true;
                    self.outbox
                        .profile_requests
                        .push(ProfileRequest::Save(player.profile()));
                }
            }
        }
        Ok(())
    }

    fn move_players(&mut self, dt: f32) {
        let world = self.tuning.world;
        let max_speed = self.tuning.player.max_speed;
        for player in self.players.values_mut() {
            if !player.is_alive() {
                continue;
            }
            player.vx = player.input.move_x * max_speed;
            player.vy = player.input.move_y * max_speed;
            player.x = (player.x + player.vx * dt).clamp(0.0, world.width);
            player.y = (player.y + player.vy * dt).clamp(0.0, world.height);
        }
    }

    fn respawn_due(&mut self) {
        let due: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| {
                matches!(p.life, LifeState::Eliminated { respawn_at: Some(at) } if self.now >= at)
            })
            .map(|p| p.id)
            .collect();
        for player_id in due {
            self.respawn(player_id);
        }
    }

    fn respawn(&mut self, player_id: PlayerId) {
        let position = self.spawn_point();
        let now = self.now;
        let shield_ms = self.tuning.player.spawn_shield_ms;
        if let Some(player) = self.players.get_mut(&player_id) {
            let hp = player.max_hp;
            player.revive_at(position, hp, now, shield_ms);
            self.events.push(WorldEvent::Respawned { player_id });
        }
    }

    fn book_casualties(&mut self, casualties: Vec<Casualty>) {
        for casualty in casualties {
            match casualty {
                Casualty::Player { victim, killer } => {
                    let revivable = self
                        .players
                        .get(&victim)
                        .and_then(|p| p.party)
                        .and_then(|id| self.parties.get(id))
                        .is_some_and(|party| party.in_run());
                    let Some(player) = self.players.get_mut(&victim) else {
                        continue;
                    };
                    let transition = combat::knock_down(player, revivable, self.now, &self.tuning);
                    self.events.push(WorldEvent::Killed {
                        victim: TargetRef::Player(victim),
                        killer,
                    });
                    self.events.push(transition);
                    self.credit_kill(killer, victim);
                }
                Casualty::Hostile { party, killer, .. } => {
                    if let Some(party) = self.parties.get_mut(party) {
                        party.score += self.tuning.waves.kill_score;
                    }
                    if let Some(killer) = killer
                        && let Some(player) = self.players.get_mut(&killer)
                    {
                        player.kills += 1;
                    }
                }
            }
        }
    }

    fn credit_kill(&mut self, killer: Option<PlayerId>, victim: PlayerId) {
        if let Some(killer) = killer.filter(|&k| k != victim)
            && let Some(player) = self.players.get_mut(&killer)
        {
            player.kills += 1;
        }
    }

    fn advance_parties(&mut self, directives: &mut Vec<WaveDirective>) {
        let tuning = Arc::clone(&self.tuning);
        for party_id in self.parties.ids() {
            let hostiles_alive = self.hostiles.values().filter(|h| h.party == party_id).count();
            let all_eliminated = self.parties.get(party_id).is_some_and(|party| {
                !party.members.is_empty()
                    && party.members.iter().all(|m| {
                        self.players
                            .get(m)
                            .is_none_or(|p| matches!(p.life, LifeState::Eliminated { .. }))
                    })
            });
            if let Some(party) = self.parties.get_mut(party_id) {
                party.advance(
                    self.now,
                    hostiles_alive,
                    all_eliminated,
                    &tuning,
                    &mut self.events,
                    directives,
                );
            }
        }
    }

    fn run_directives(&mut self, directives: Vec<WaveDirective>) {
        for directive in directives {
            match directive {
                WaveDirective::SpawnHostile { party, definition } => {
                    self.next_hostile_id += 1;
                    let id = self.next_hostile_id;
                    let position = self.hostile_spawn_point();
                    self.hostiles.insert(
                        id,
                        Hostile::spawn(id, party, position, &definition, &self.tuning.waves),
                    );
                    self.events.push(WorldEvent::HostileSpawned { id, party });
                }
                WaveDirective::ReviveMembers { party } => {
                    let members = self
                        .parties
                        .get(party)
                        .map(|p| p.members.clone())
                        .unwrap_or_default();
                    for member in members {
                        if self.players.get(&member).is_some_and(|p| !p.is_alive()) {
                            self.respawn(member);
                        }
                    }
                }
                WaveDirective::ClearHostiles { party } => self.clear_hostiles(party),
                WaveDirective::RunEnded { party, wave } => self.end_run(party, wave),
            }
        }
    }

    fn end_run(&mut self, party: PartyId, wave: u32) {
        let members = self
            .parties
            .get(party)
            .map(|p| p.members.clone())
            .unwrap_or_default();
        let respawn_at = self.now + self.tuning.player.respawn_ms;
        for member in members {
            let Some(player) = self.players.get_mut(&member) else {
                continue;
            };
            if !player.is_alive() {
                player.life = LifeState::Eliminated {
                    respawn_at: Some(respawn_at),
                };
            }
            if wave > player.best_wave {
                player.best_wave = wave;
                self.outbox
                    .profile_requests
                    .push(ProfileRequest::Save(player.profile()));
            }
        }
    }

    fn clear_hostiles(&mut self, party: PartyId) {
        self.hostiles.retain(|_, h| h.party != party);
    }

    fn spawn_point(&mut self) -> (f32, f32) {
        let world = self.tuning.world;
        let structures = &self.tuning.structures;
        let margin = structures.tile_size as f32;
        let x = self.rng.gen_range(margin..(world.width - margin).max(margin + 1.0));
        let y = self.rng.gen_range(
            structures.band_min_y as f32..(structures.band_max_y as f32).max(structures.band_min_y as f32 + 1.0),
        );
        (x, y)
    }

    fn hostile_spawn_point(&mut self) -> (f32, f32) {
        let world = self.tuning.world;
        let structures = &self.tuning.structures;
        let x = if self.rng.gen_bool(0.5) { 0.0 } else { world.width };
        let y = self.rng.gen_range(
            structures.band_min_y as f32..(structures.band_max_y as f32).max(structures.band_min_y as f32 + 1.0),
        );
        (x, y)
    }

    fn snapshot(&mut self) -> WorldSnapshot {
        let now = self.now;
        let players = self
            .players
            .values()
            .map(|p| {
                let weapon = p.equipped.and_then(|kind| {
                    self.weapons
                        .get(&WeaponKey { owner: p.id, kind })
                        .map(|w| {
                            let w = w.refreshed(now);
                            WeaponView {
                                kind,
                                level: w.level,
                                ammo: w.ammo,
                                magazine: w.magazine,
                                reloading: w.is_reloading,
                            }
                        })
                });
                PlayerSnapshot {
                    id: p.id,
                    display_name: p.display_name.clone(),
                    x: p.x,
                    y: p.y,
                    vx: p.vx,
                    vy: p.vy,
                    hp: p.hp,
                    max_hp: p.max_hp,
                    role: p.role,
                    life: life_view(p.life, self.tuning.combat.revive_ms),
                    weapon,
                    shielded: now < p.shield_until,
                    party: p.party,
                    kills: p.kills,
                    deaths: p.deaths,
                }
            })
            .collect();

        let projectiles = self
            .projectiles
            .iter()
            .map(|p| ProjectileSnapshot {
                id: p.id,
                owner: p.owner,
                weapon: p.weapon,
                x: p.x,
                y: p.y,
                rot: p.rotation(),
            })
            .collect();

        let hostiles = self
            .hostiles
            .values()
            .map(|h| HostileSnapshot {
                id: h.id,
                party: h.party,
                x: h.x,
                y: h.y,
                hp: h.hp,
                max_hp: h.max_hp,
            })
            .collect();

        let parties = self
            .parties
            .iter()
            .map(|p| PartySnapshot {
                id: p.id,
                leader: p.leader,
                members: p.members.clone(),
                open: p.open,
                team_lives: p.team_lives,
                phase: p.phase,
                score: p.score,
            })
            .collect();

        WorldSnapshot {
            tick: self.tick,
            time_ms: now,
            players,
            projectiles,
            hostiles,
            parties,
            structures: self.structures.take_diff(),
            events: std::mem::take(&mut self.events),
        }
    }
}

fn life_view(life: LifeState, revive_ms: u64) -> LifeView {
    match life {
        LifeState::Alive => LifeView::Alive,
        LifeState::Downed {
            bleed_out_at,
            revive,
        } => LifeView::Downed {
            bleed_out_at,
            revive_progress: revive.map_or(0.0, |r| {
                (r.elapsed_ms as f32 / revive_ms.max(1) as f32).min(1.0)
            }),
        },
        LifeState::Eliminated { respawn_at } => LifeView::Eliminated { respawn_at },
    }
}
