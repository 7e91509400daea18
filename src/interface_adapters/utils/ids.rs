use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Log correlation id for an accepted socket. Sequential from 1 so `conn_id` fields stay short.
pub fn next_conn_id() -> u64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Token that ties a player id to the socket currently owning it.
///
/// The world compares it on `Leave`, so a replaced socket can never evict its successor.
/// Seeded from the clock and never zero.
pub fn next_conn_token() -> u64 {
    static TOKENS: OnceLock<AtomicU64> = OnceLock::new();
    let tokens = TOKENS.get_or_init(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        AtomicU64::new(seed.max(1))
    });
    tokens.fetch_add(1, Ordering::Relaxed).max(1)
}
