// Weapon state machine: ammo, fire interval and reload as pure functions of time.
//
// Timers are never scheduled. A reload "completes" the first time the instance is read at or
// after `reload_ends_at`, so cancelling one is just overwriting the state.

use crate::domain::player::PlayerId;
use crate::domain::tuning::WeaponTuning;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Pistol,
    Rifle,
    Shotgun,
    Smg,
    Sniper,
    RocketLauncher,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 6] = [
        WeaponKind::Pistol,
        WeaponKind::Rifle,
        WeaponKind::Shotgun,
        WeaponKind::Smg,
        WeaponKind::Sniper,
        WeaponKind::RocketLauncher,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pistol" => Some(WeaponKind::Pistol),
            "rifle" => Some(WeaponKind::Rifle),
            "shotgun" => Some(WeaponKind::Shotgun),
            "smg" => Some(WeaponKind::Smg),
            "sniper" => Some(WeaponKind::Sniper),
            "rocket_launcher" | "rocket" => Some(WeaponKind::RocketLauncher),
            _ => None,
        }
    }
}

/// Stable identity of a weapon instance: one per owner and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeaponKey {
    pub owner: PlayerId,
    pub kind: WeaponKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireRejection {
    OutOfAmmo,
    Reloading,
    FireRateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadRejection {
    AlreadyReloading,
    MagazineFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponInstance {
    pub key: WeaponKey,
    pub level: u8,
    pub ammo: u32,
    pub magazine: u32,
    /// `None` until the first shot so a fresh weapon can fire at time zero.
    pub last_fired_at: Option<u64>,
    pub is_reloading: bool,
    pub reload_ends_at: u64,
}

impl WeaponInstance {
    /// Fresh instance with a full magazine.
    pub fn new(key: WeaponKey, level: u8, tuning: &WeaponTuning) -> Self {
        let level = tuning.clamp_level(level);
        let magazine = tuning.magazine(key.kind, level);
        Self {
            key,
            level,
            ammo: magazine,
            magazine,
            last_fired_at: None,
            is_reloading: false,
            reload_ends_at: 0,
        }
    }

    /// Lazy reload completion. Every read goes through here first.
    pub fn refreshed(mut self, now: u64) -> Self {
        if self.is_reloading && now >= self.reload_ends_at {
            self.is_reloading = false;
            self.ammo = self.magazine;
        }
        self
    }

    pub fn check_fire(&self, now: u64, tuning: &WeaponTuning) -> Result<(), FireRejection> {
        let current = self.refreshed(now);
        if current.ammo == 0 {
            return Err(FireRejection::OutOfAmmo);
        }
        if current.is_reloading {
            return Err(FireRejection::Reloading);
        }
        if let Some(last) = current.last_fired_at {
            let interval = tuning.fire_interval_ms(current.key.kind, current.level);
            if now.saturating_sub(last) < interval {
                return Err(FireRejection::FireRateLimited);
            }
        }
        Ok(())
    }

    pub fn can_fire(&self, now: u64, tuning: &WeaponTuning) -> bool {
        self.check_fire(now, tuning).is_ok()
    }

    /// Consumes one round. Emptying the magazine starts a reload.
    pub fn fire(self, now: u64, tuning: &WeaponTuning) -> Result<Self, FireRejection> {
        self.check_fire(now, tuning)?;
        let mut next = self.refreshed(now);
        next.ammo -= 1;
        next.last_fired_at = Some(now);
        if next.ammo == 0 {
            next = next.begin_reload(now, tuning);
        }
        Ok(next)
    }

    pub fn start_reload(self, now: u64, tuning: &WeaponTuning) -> Result<Self, ReloadRejection> {
        let current = self.refreshed(now);
        if current.is_reloading {
            return Err(ReloadRejection::AlreadyReloading);
        }
        if current.ammo >= current.magazine {
            return Err(ReloadRejection::MagazineFull);
        }
        Ok(current.begin_reload(now, tuning))
    }

    /// Applies a new upgrade level; the magazine is refilled to the new size.
    pub fn with_level(self, level: u8, tuning: &WeaponTuning) -> Self {
        let mut next = Self::new(self.key, level, tuning);
        next.last_fired_at = self.last_fired_at;
        next
    }

    fn begin_reload(mut self, now: u64, tuning: &WeaponTuning) -> Self {
        self.is_reloading = true;
        self.reload_ends_at = now + tuning.reload_ms(self.key.kind, self.level);
        self
    }
}
