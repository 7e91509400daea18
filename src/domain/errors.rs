// Domain-level rejection codes. Sent only to the session that issued the action.

use crate::domain::weapon::{FireRejection, ReloadRejection};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    // Weapons.
    OutOfAmmo,
    Reloading,
    FireRateLimited,
    AlreadyReloading,
    MagazineFull,
    NoWeaponEquipped,
    EmptySlot,
    WeaponLocked,
    NotAlive,
    // Structures.
    CellOccupied,
    OutsideBuildBand,
    TooFar,
    Misaligned,
    ReservedStructure,
    NoStructure,
    DeleteRateLimited,
    NotStructureOwner,
    // Parties.
    AlreadyInParty,
    NotInParty,
    PartyNotFound,
    PartyClosed,
    PartyFull,
    NotPartyLeader,
    RunInProgress,
    // Commands and flow control.
    UnknownCommand,
    NotAuthorized,
    InvalidArgument,
    QueueFull,
}

impl RejectReason {
    /// Human-readable text shown by the client.
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::OutOfAmmo => "out of ammo",
            RejectReason::Reloading => "weapon is reloading",
            RejectReason::FireRateLimited => "firing too fast",
            RejectReason::AlreadyReloading => "already reloading",
            RejectReason::MagazineFull => "magazine is full",
            RejectReason::NoWeaponEquipped => "no weapon equipped",
            RejectReason::EmptySlot => "inventory slot is empty",
            RejectReason::WeaponLocked => "your role cannot use this weapon",
            RejectReason::NotAlive => "you are not alive",
            RejectReason::CellOccupied => "cell is already occupied",
            RejectReason::OutsideBuildBand => "cannot build at this height",
            RejectReason::TooFar => "too far away to build there",
            RejectReason::Misaligned => "position is not on the grid",
            RejectReason::ReservedStructure => "that structure is reserved",
            RejectReason::NoStructure => "nothing to delete there",
            RejectReason::DeleteRateLimited => "deleting too fast",
            RejectReason::NotStructureOwner => "you do not own that structure",
            RejectReason::AlreadyInParty => "already in a party",
            RejectReason::NotInParty => "not in a party",
            RejectReason::PartyNotFound => "party not found",
            RejectReason::PartyClosed => "party is closed",
            RejectReason::PartyFull => "party is full",
            RejectReason::NotPartyLeader => "only the party leader can do that",
            RejectReason::RunInProgress => "a run is already in progress",
            RejectReason::UnknownCommand => "unknown command",
            RejectReason::NotAuthorized => "not allowed for your role",
            RejectReason::InvalidArgument => "invalid argument",
            RejectReason::QueueFull => "too many pending actions",
        }
    }
}

impl From<FireRejection> for RejectReason {
    fn from(value: FireRejection) -> Self {
        match value {
            FireRejection::OutOfAmmo => RejectReason::OutOfAmmo,
            FireRejection::Reloading => RejectReason::Reloading,
            FireRejection::FireRateLimited => RejectReason::FireRateLimited,
        }
    }
}

impl From<ReloadRejection> for RejectReason {
    fn from(value: ReloadRejection) -> Self {
        match value {
            ReloadRejection::AlreadyReloading => RejectReason::AlreadyReloading,
            ReloadRejection::MagazineFull => RejectReason::MagazineFull,
        }
    }
}
