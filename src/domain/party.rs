// Parties and the cooperative wave run: membership, shared lives and wave progression.

use crate::domain::errors::RejectReason;
use crate::domain::events::WorldEvent;
use crate::domain::player::{PartyId, PlayerId};
use crate::domain::tuning::{GameTuning, WaveDefinition};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyPhase {
    /// Open for membership changes; no run in progress.
    Lobby,
    Countdown { wave: u32, starts_at: u64 },
    WaveActive { wave: u32 },
    WaveCompleted { wave: u32, next_at: u64 },
    GameOver { wave: u32, score: u64 },
}

impl PartyPhase {
    pub fn wave(self) -> u32 {
        match self {
            PartyPhase::Lobby => 0,
            PartyPhase::Countdown { wave, .. }
            | PartyPhase::WaveActive { wave }
            | PartyPhase::WaveCompleted { wave, .. }
            | PartyPhase::GameOver { wave, .. } => wave,
        }
    }
}

/// Work the world performs on behalf of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveDirective {
    SpawnHostile {
        party: PartyId,
        definition: WaveDefinition,
    },
    /// Bring every downed or eliminated member back for the coming wave.
    ReviveMembers { party: PartyId },
    ClearHostiles { party: PartyId },
    /// The run is over; members return to free play.
    RunEnded { party: PartyId, wave: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    pub id: PartyId,
    pub leader: PlayerId,
    /// Join order; the head is the longest-standing member.
    pub members: Vec<PlayerId>,
    pub open: bool,
    pub team_lives: u32,
    pub phase: PartyPhase,
    pub score: u64,
    hostiles_to_spawn: u32,
    next_spawn_at: u64,
}

impl Party {
    fn new(id: PartyId, leader: PlayerId) -> Self {
        Self {
            id,
            leader,
            members: vec![leader],
            open: true,
            team_lives: 0,
            phase: PartyPhase::Lobby,
            score: 0,
            hostiles_to_spawn: 0,
            next_spawn_at: 0,
        }
    }

    /// Whether deaths inside this party are revivable and cost lives.
    pub fn in_run(&self) -> bool {
        matches!(
            self.phase,
            PartyPhase::Countdown { .. } | PartyPhase::WaveActive { .. } | PartyPhase::WaveCompleted { .. }
        )
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.members.contains(&player_id)
    }

    /// Removes one shared life. Reaching zero ends the run.
    pub fn lose_life(
        &mut self,
        events: &mut Vec<WorldEvent>,
        directives: &mut Vec<WaveDirective>,
    ) {
        if !self.in_run() || self.team_lives == 0 {
            return;
        }
        self.team_lives -= 1;
        if self.team_lives == 0 {
            self.end_run(events, directives);
        }
    }

    /// Advances the wave state machine. `hostiles_alive` counts this party's live hostiles and
    /// `all_eliminated` is true when no member can still fight or be revived.
    pub fn advance(
        &mut self,
        now: u64,
        hostiles_alive: usize,
        all_eliminated: bool,
        tuning: &GameTuning,
        events: &mut Vec<WorldEvent>,
        directives: &mut Vec<WaveDirective>,
    ) {
        let waves = &tuning.waves;
        match self.phase {
            PartyPhase::Lobby | PartyPhase::GameOver { .. } => {}
            PartyPhase::Countdown { wave, starts_at } => {
                if now >= starts_at {
                    self.begin_wave(wave, now, tuning, events, directives);
                }
            }
            PartyPhase::WaveCompleted { wave, next_at } => {
                if now >= next_at {
                    self.begin_wave(wave + 1, now, tuning, events, directives);
                }
            }
            PartyPhase::WaveActive { wave } => {
                if all_eliminated {
                    // Lives remain (otherwise the run already ended): replay the wave.
                    self.hostiles_to_spawn = 0;
                    self.phase = PartyPhase::Countdown {
                        wave,
                        starts_at: now + waves.countdown_ms,
                    };
                    directives.push(WaveDirective::ClearHostiles { party: self.id });
                    events.push(WorldEvent::WaveRestarted {
                        party: self.id,
                        wave,
                    });
                    return;
                }

                if self.hostiles_to_spawn > 0 && now >= self.next_spawn_at {
                    self.hostiles_to_spawn -= 1;
                    self.next_spawn_at = now + waves.spawn_interval_ms;
                    directives.push(WaveDirective::SpawnHostile {
                        party: self.id,
                        definition: waves.definition(wave),
                    });
                    return;
                }

                if self.hostiles_to_spawn == 0 && hostiles_alive == 0 {
                    self.score += waves.wave_clear_score;
                    self.phase = PartyPhase::WaveCompleted {
                        wave,
                        next_at: now + waves.intermission_ms,
                    };
                    events.push(WorldEvent::WaveCleared {
                        party: self.id,
                        wave,
                    });
                }
            }
        }
    }

    fn begin_wave(
        &mut self,
        wave: u32,
        now: u64,
        tuning: &GameTuning,
        events: &mut Vec<WorldEvent>,
        directives: &mut Vec<WaveDirective>,
    ) {
        self.phase = PartyPhase::WaveActive { wave };
        self.hostiles_to_spawn = tuning.waves.definition(wave).hostile_count;
        self.next_spawn_at = now;
        directives.push(WaveDirective::ReviveMembers { party: self.id });
        events.push(WorldEvent::WaveStarted {
            party: self.id,
            wave,
        });
    }

    fn end_run(&mut self, events: &mut Vec<WorldEvent>, directives: &mut Vec<WaveDirective>) {
        let wave = self.phase.wave();
        self.phase = PartyPhase::GameOver {
            wave,
            score: self.score,
        };
        self.hostiles_to_spawn = 0;
        directives.push(WaveDirective::ClearHostiles { party: self.id });
        directives.push(WaveDirective::RunEnded {
            party: self.id,
            wave,
        });
        events.push(WorldEvent::GameOver {
            party: self.id,
            wave,
            score: self.score,
        });
    }
}

/// Outcome of a member leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub party: PartyId,
    /// Set when leadership moved to another member.
    pub new_leader: Option<PlayerId>,
    /// The party became empty and was destroyed.
    pub destroyed: bool,
}

#[derive(Debug, Default)]
pub struct PartyBook {
    parties: BTreeMap<PartyId, Party>,
    next_id: PartyId,
}

impl PartyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PartyId) -> Option<&Party> {
        self.parties.get(&id)
    }

    pub fn get_mut(&mut self, id: PartyId) -> Option<&mut Party> {
        self.parties.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Party> {
        self.parties.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Party> {
        self.parties.values_mut()
    }

    pub fn ids(&self) -> Vec<PartyId> {
        self.parties.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    pub fn party_of(&self, player_id: PlayerId) -> Option<&Party> {
        self.parties.values().find(|p| p.is_member(player_id))
    }

    pub fn create(&mut self, leader: PlayerId) -> Result<PartyId, RejectReason> {
        if self.party_of(leader).is_some() {
            return Err(RejectReason::AlreadyInParty);
        }
        self.next_id += 1;
        let id = self.next_id;
        self.parties.insert(id, Party::new(id, leader));
        Ok(id)
    }

    pub fn join(
        &mut self,
        player_id: PlayerId,
        party_id: PartyId,
        max_members: usize,
    ) -> Result<(), RejectReason> {
        if self.party_of(player_id).is_some() {
            return Err(RejectReason::AlreadyInParty);
        }
        let party = self
            .parties
            .get_mut(&party_id)
            .ok_or(RejectReason::PartyNotFound)?;
        if !party.open {
            return Err(RejectReason::PartyClosed);
        }
        if party.in_run() {
            return Err(RejectReason::RunInProgress);
        }
        if party.members.len() >= max_members {
            return Err(RejectReason::PartyFull);
        }
        party.members.push(player_id);
        Ok(())
    }

    pub fn leave(&mut self, player_id: PlayerId) -> Result<Departure, RejectReason> {
        let party = self
            .parties
            .values_mut()
            .find(|p| p.is_member(player_id))
            .ok_or(RejectReason::NotInParty)?;
        party.members.retain(|&m| m != player_id);
        let id = party.id;

        if party.members.is_empty() {
            self.parties.remove(&id);
            return Ok(Departure {
                party: id,
                new_leader: None,
                destroyed: true,
            });
        }

        let new_leader = if party.leader == player_id {
            party.leader = party.members[0];
            Some(party.leader)
        } else {
            None
        };
        Ok(Departure {
            party: id,
            new_leader,
            destroyed: false,
        })
    }

    /// Leader-only: removes the party and returns its former members.
    pub fn disband(&mut self, player_id: PlayerId) -> Result<(PartyId, Vec<PlayerId>), RejectReason> {
        let id = self.led_by(player_id)?;
        let party = self.parties.remove(&id).ok_or(RejectReason::PartyNotFound)?;
        Ok((id, party.members))
    }

    pub fn set_open(&mut self, player_id: PlayerId, open: bool) -> Result<PartyId, RejectReason> {
        let id = self.led_by(player_id)?;
        let party = self.parties.get_mut(&id).ok_or(RejectReason::PartyNotFound)?;
        party.open = open;
        Ok(id)
    }

    /// Leader-only: starts (or restarts after game over) the cooperative run.
    pub fn start_run(
        &mut self,
        player_id: PlayerId,
        now: u64,
        tuning: &GameTuning,
    ) -> Result<PartyId, RejectReason> {
        let id = self.led_by(player_id)?;
        let party = self.parties.get_mut(&id).ok_or(RejectReason::PartyNotFound)?;
        if party.in_run() {
            return Err(RejectReason::RunInProgress);
        }
        party.team_lives = tuning.party.team_lives;
        party.score = 0;
        party.hostiles_to_spawn = 0;
        party.phase = PartyPhase::Countdown {
            wave: 1,
            starts_at: now + tuning.waves.countdown_ms,
        };
        Ok(id)
    }

    fn led_by(&self, player_id: PlayerId) -> Result<PartyId, RejectReason> {
        let party = self.party_of(player_id).ok_or(RejectReason::NotInParty)?;
        if party.leader != player_id {
            return Err(RejectReason::NotPartyLeader);
        }
        Ok(party.id)
    }
}
