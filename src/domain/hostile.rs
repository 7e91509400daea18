// Wave hostiles: chase the nearest living party member and hit on contact.

use crate::domain::player::PartyId;
use crate::domain::tuning::{WaveDefinition, WaveTuning};

pub type HostileId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct Hostile {
    pub id: HostileId,
    pub party: PartyId,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub speed: f32,
    pub radius: f32,
    pub contact_damage: f32,
    pub next_attack_at: u64,
}

impl Hostile {
    pub fn spawn(
        id: HostileId,
        party: PartyId,
        position: (f32, f32),
        definition: &WaveDefinition,
        tuning: &WaveTuning,
    ) -> Self {
        Self {
            id,
            party,
            x: position.0,
            y: position.1,
            hp: definition.hostile_hp,
            max_hp: definition.hostile_hp,
            speed: definition.hostile_speed,
            radius: tuning.hostile_radius,
            contact_damage: tuning.contact_damage,
            next_attack_at: 0,
        }
    }

    /// Moves toward `target`, stopping once the hit volumes touch. Returns true on contact.
    pub fn advance_toward(&mut self, target: (f32, f32), target_radius: f32, dt: f32) -> bool {
        let dx = target.0 - self.x;
        let dy = target.1 - self.y;
        let distance = (dx * dx + dy * dy).sqrt();
        let reach = self.radius + target_radius;
        if distance <= reach {
            return true;
        }

        let step = (self.speed * dt).min(distance - reach);
        self.x += dx / distance * step;
        self.y += dy / distance * step;
        distance - step <= reach + f32::EPSILON
    }

    /// Consumes the attack cooldown if it has elapsed.
    pub fn try_attack(&mut self, now: u64, cooldown_ms: u64) -> bool {
        if now < self.next_attack_at {
            return false;
        }
        self.next_attack_at = now + cooldown_ms;
        true
    }

    /// Applies damage and returns true when the hostile dies.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        self.hp -= amount;
        self.hp <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hostile() -> Hostile {
        let tuning = WaveTuning::default();
        let definition = tuning.definition(1);
        Hostile::spawn(1, 1, (0.0, 0.0), &definition, &tuning)
    }

    #[test]
    fn when_target_is_far_then_hostile_closes_in_at_its_speed() {
        let mut h = hostile();
        let contact = h.advance_toward((1000.0, 0.0), 24.0, 0.5);
        assert!(!contact);
        assert!((h.x - h.speed * 0.5).abs() < 1e-3);
    }

    #[test]
    fn when_hostile_reaches_target_then_it_stops_at_contact_distance() {
        let mut h = hostile();
        let contact = h.advance_toward((50.0, 0.0), 24.0, 10.0);
        assert!(contact);
        assert!((h.x - (50.0 - h.radius - 24.0)).abs() < 1e-3);
    }

    #[test]
    fn when_cooldown_has_not_elapsed_then_attack_is_skipped() {
        let mut h = hostile();
        assert!(h.try_attack(100, 800));
        assert!(!h.try_attack(899, 800));
        assert!(h.try_attack(900, 800));
    }
}
