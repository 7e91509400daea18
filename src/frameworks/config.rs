use std::{env, path::PathBuf, time::Duration};

// Runtime/server settings. Gameplay numbers live in the tuning tables instead.

pub fn http_port() -> u16 {
    env::var("GAME_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn auth_service_url() -> String {
    env::var("AUTH_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:3002".to_string())
}

pub fn auth_verify_timeout() -> Duration {
    let millis = env::var("AUTH_VERIFY_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1500);
    Duration::from_millis(millis)
}

// Unset or blank means profiles are kept in memory.
pub fn database_url() -> Option<String> {
    env::var("DATABASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub fn tuning_path() -> Option<PathBuf> {
    env::var("GAME_TUNING_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

pub fn tick_rate_hz() -> u32 {
    env::var("TICK_RATE_HZ")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|hz| (1..=240).contains(hz))
        .unwrap_or(DEFAULT_TICK_RATE_HZ)
}

pub fn tick_interval() -> Duration {
    Duration::from_millis(1000 / u64::from(tick_rate_hz()))
}

pub const DEFAULT_TICK_RATE_HZ: u32 = 30;
pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;
// Pending actions per player before QueueFull.
pub const ACTION_QUEUE_CAPACITY: usize = 16;
pub const PROFILE_QUEUE_CAPACITY: usize = 256;
// World every client lands in when it omits `world_id`.
pub const DEFAULT_WORLD_ID: &str = "main";
