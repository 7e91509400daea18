// Player actions queued for the tick, and chat command parsing.

use crate::domain::errors::RejectReason;
use crate::domain::events::ActionKind;
use crate::domain::player::{PartyId, PlayerId, Role};
use crate::domain::projectile::ProjectileId;
use crate::domain::structures::{StructureKind, TileKey};
use crate::domain::weapon::WeaponKind;

pub const MAX_CHAT_LEN: usize = 200;

/// A discrete action. At most one per player is applied per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fire {
        angle: f32,
        client_shot_id: Option<u32>,
    },
    Reload,
    SwitchWeapon {
        slot: usize,
    },
    PlaceStructure {
        kind: StructureKind,
        key: TileKey,
    },
    DeleteStructure {
        key: TileKey,
    },
    RetireProjectile {
        id: ProjectileId,
    },
    Party(PartyCommand),
    Chat {
        text: String,
    },
}

impl Command {
    pub fn action(&self) -> ActionKind {
        match self {
            Command::Fire { .. } => ActionKind::Fire,
            Command::RetireProjectile { .. } => ActionKind::RetireProjectile,
            Command::Reload => ActionKind::Reload,
            Command::SwitchWeapon { .. } => ActionKind::SwitchWeapon,
            Command::PlaceStructure { .. } => ActionKind::PlaceStructure,
            Command::DeleteStructure { .. } => ActionKind::DeleteStructure,
            Command::Party(_) => ActionKind::Party,
            Command::Chat { text } if text.trim_start().starts_with('/') => ActionKind::Command,
            Command::Chat { .. } => ActionKind::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyCommand {
    Create,
    Join { party_id: PartyId },
    Leave,
    SetOpen { open: bool },
    StartRun,
    Disband,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Say(String),
    SetRole { target: PlayerId, role: Role },
    Announce(String),
    ResetGrid,
    SetLevel { weapon: WeaponKind, level: u8 },
    Tutorial,
}

impl ChatCommand {
    pub fn required_role(&self) -> Role {
        match self {
            ChatCommand::Say(_) | ChatCommand::Tutorial => Role::Player,
            ChatCommand::SetLevel { .. } => Role::Mod,
            ChatCommand::Announce(_) | ChatCommand::ResetGrid => Role::Admin,
            ChatCommand::SetRole { .. } => Role::Owner,
        }
    }
}

/// Parses chat text; a leading `/` selects a command.
pub fn parse_chat(raw: &str) -> Result<ChatCommand, RejectReason> {
    let text = raw.trim();
    if text.is_empty() || text.chars().count() > MAX_CHAT_LEN {
        return Err(RejectReason::InvalidArgument);
    }
    let Some(body) = text.strip_prefix('/') else {
        return Ok(ChatCommand::Say(text.to_string()));
    };

    let mut parts = body.split_whitespace();
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    match name.as_str() {
        "role" => {
            let target = parts
                .next()
                .and_then(|v| v.parse::<PlayerId>().ok())
                .ok_or(RejectReason::InvalidArgument)?;
            let role = parts
                .next()
                .and_then(Role::parse)
                .ok_or(RejectReason::InvalidArgument)?;
            Ok(ChatCommand::SetRole { target, role })
        }
        "announce" => {
            // Everything after the command token, spacing inside the message kept.
            let message = body
                .trim_start()
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or_default();
            if message.is_empty() {
                return Err(RejectReason::InvalidArgument);
            }
            Ok(ChatCommand::Announce(message.to_string()))
        }
        "resetgrid" => Ok(ChatCommand::ResetGrid),
        "level" => {
            let weapon = parts
                .next()
                .and_then(WeaponKind::parse)
                .ok_or(RejectReason::InvalidArgument)?;
            let level = parts
                .next()
                .and_then(|v| v.parse::<u8>().ok())
                .ok_or(RejectReason::InvalidArgument)?;
            Ok(ChatCommand::SetLevel { weapon, level })
        }
        "tutorial" => Ok(ChatCommand::Tutorial),
        _ => Err(RejectReason::UnknownCommand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_text_has_no_slash_then_it_is_plain_chat() {
        assert_eq!(parse_chat("  hello  "), Ok(ChatCommand::Say("hello".into())));
    }

    #[test]
    fn when_text_is_too_long_or_blank_then_it_is_rejected() {
        assert_eq!(parse_chat("   "), Err(RejectReason::InvalidArgument));
        let long = "x".repeat(MAX_CHAT_LEN + 1);
        assert_eq!(parse_chat(&long), Err(RejectReason::InvalidArgument));
    }

    #[test]
    fn when_role_command_is_well_formed_then_it_parses() {
        assert_eq!(
            parse_chat("/role 42 admin"),
            Ok(ChatCommand::SetRole {
                target: 42,
                role: Role::Admin
            })
        );
        assert_eq!(parse_chat("/role x admin"), Err(RejectReason::InvalidArgument));
    }

    #[test]
    fn when_announce_has_text_then_message_keeps_spacing() {
        assert_eq!(
            parse_chat("/announce  server  restart soon"),
            Ok(ChatCommand::Announce("server  restart soon".into()))
        );
        assert_eq!(parse_chat("/announce"), Err(RejectReason::InvalidArgument));
    }

    #[test]
    fn when_command_is_preceded_by_whitespace_then_message_is_intact() {
        assert_eq!(
            parse_chat("/ announce hello"),
            Ok(ChatCommand::Announce("hello".into()))
        );
        assert_eq!(
            parse_chat("/\u{3000}\u{3000}\u{3000}announce hi"),
            Ok(ChatCommand::Announce("hi".into()))
        );
        assert_eq!(
            parse_chat("/announce\u{3000}\u{3000}ol\u{e1}"),
            Ok(ChatCommand::Announce("ol\u{e1}".into()))
        );
    }

    #[test]
    fn when_level_command_names_a_weapon_then_it_parses() {
        assert_eq!(
            parse_chat("/level rocket 3"),
            Ok(ChatCommand::SetLevel {
                weapon: WeaponKind::RocketLauncher,
                level: 3
            })
        );
    }

    #[test]
    fn when_projectile_is_retired_then_it_is_not_labelled_as_a_shot() {
        assert_eq!(
            Command::RetireProjectile { id: 3 }.action(),
            ActionKind::RetireProjectile
        );
        assert_eq!(
            Command::Chat {
                text: " /tutorial".into()
            }
            .action(),
            ActionKind::Command
        );
    }

    #[test]
    fn when_command_is_unknown_then_it_is_rejected() {
        assert_eq!(parse_chat("/fly"), Err(RejectReason::UnknownCommand));
    }

    #[test]
    fn commands_are_gated_by_role() {
        assert_eq!(ChatCommand::ResetGrid.required_role(), Role::Admin);
        assert_eq!(
            ChatCommand::SetRole {
                target: 1,
                role: Role::Mod
            }
            .required_role(),
            Role::Owner
        );
    }
}
