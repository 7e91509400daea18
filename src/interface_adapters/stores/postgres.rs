use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;

use crate::domain::weapon::WeaponKind;
use crate::domain::{PlayerId, PlayerProfile, ProfileStore, Role, StoreError};

// PostgreSQL-backed profile store. Inventory and weapon levels are JSON text columns.
#[derive(Clone)]
pub struct PostgresProfileStore {
    pub db: PgPool,
}

type ProfileRow = (String, String, String, i64, i64, i32, bool);

impl PostgresProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn corrupt(e: serde_json::Error) -> StoreError {
    StoreError::Corrupt(e.to_string())
}

fn profile_from_row(account_id: PlayerId, row: ProfileRow) -> Result<PlayerProfile, StoreError> {
    let (role, inventory, weapon_levels, kills, deaths, best_wave, tutorial_seen) = row;
    let role =
        Role::parse(&role).ok_or_else(|| StoreError::Corrupt(format!("unknown role {role:?}")))?;
    let inventory: Vec<Option<WeaponKind>> = serde_json::from_str(&inventory).map_err(corrupt)?;
    let weapon_levels: BTreeMap<WeaponKind, u8> =
        serde_json::from_str(&weapon_levels).map_err(corrupt)?;

    Ok(PlayerProfile {
        account_id,
        role,
        inventory,
        weapon_levels,
        kills: kills.max(0) as u64,
        deaths: deaths.max(0) as u64,
        best_wave: best_wave.max(0) as u32,
        tutorial_seen,
    })
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerProfile>, StoreError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT role, inventory, weapon_levels, kills, deaths, best_wave, tutorial_seen
            FROM player_profiles
            WHERE account_id = $1
            "#,
        )
        .bind(player_id as i64)
        .fetch_optional(&self.db)
        .await
        .map_err(unavailable)?;

        row.map(|row| profile_from_row(player_id, row)).transpose()
    }

    // Upsert the whole profile; the world always saves a complete snapshot.
    async fn save(&self, profile: PlayerProfile) -> Result<(), StoreError> {
        let inventory = serde_json::to_string(&profile.inventory).map_err(corrupt)?;
        let weapon_levels = serde_json::to_string(&profile.weapon_levels).map_err(corrupt)?;

        sqlx::query(
            r#"
            INSERT INTO player_profiles
                (account_id, role, inventory, weapon_levels, kills, deaths, best_wave, tutorial_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (account_id) DO UPDATE SET
                role = EXCLUDED.role,
                inventory = EXCLUDED.inventory,
                weapon_levels = EXCLUDED.weapon_levels,
                kills = EXCLUDED.kills,
                deaths = EXCLUDED.deaths,
                best_wave = EXCLUDED.best_wave,
                tutorial_seen = EXCLUDED.tutorial_seen,
                updated_at = now()
            "#,
        )
        .bind(profile.account_id as i64)
        .bind(profile.role.as_str())
        .bind(inventory)
        .bind(weapon_levels)
        .bind(profile.kills as i64)
        .bind(profile.deaths as i64)
        .bind(profile.best_wave as i32)
        .bind(profile.tutorial_seen)
        .execute(&self.db)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str, inventory: &str) -> ProfileRow {
        (
            role.to_string(),
            inventory.to_string(),
            r#"{"rifle":2}"#.to_string(),
            3,
            1,
            4,
            true,
        )
    }

    #[test]
    fn when_row_is_well_formed_then_profile_is_rebuilt() {
        let profile =
            profile_from_row(8, row("admin", r#"["pistol",null,"shotgun"]"#)).expect("profile");
        assert_eq!(profile.account_id, 8);
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(
            profile.inventory,
            vec![Some(WeaponKind::Pistol), None, Some(WeaponKind::Shotgun)]
        );
        assert_eq!(profile.weapon_levels.get(&WeaponKind::Rifle), Some(&2));
        assert_eq!(profile.best_wave, 4);
    }

    #[test]
    fn when_row_has_unknown_role_then_profile_is_corrupt() {
        let result = profile_from_row(8, row("emperor", "[]"));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn when_inventory_is_not_json_then_profile_is_corrupt() {
        let result = profile_from_row(8, row("player", "pistol"));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }
}
