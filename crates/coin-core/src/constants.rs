//! ─── Coin lifecycle protocol constants (spec §6 "Configuration") ──────────

/// Active-entry time-to-live before `purge_expired` reaps it: 30 days.
pub const VAULT_KEY_TTL_DAYS: u32 = 30;
pub const VAULT_KEY_TTL_SECS: i64 = VAULT_KEY_TTL_DAYS as i64 * 24 * 3600;

/// Grace window a burned entry remains readable (by ID, metadata only)
/// before it is hard-deleted: 60 seconds.
pub const VAULT_BURN_GRACE_SECS: i64 = 60;

/// Total cached-coin storage budget across all contacts, bytes.
pub const INV_MAX_STORAGE_BYTES: u64 = 65_536;

/// Retry budget for `SmartInventory::store_key`'s optimistic transaction.
pub const INV_OPTIMISTIC_LOCK_RETRIES: u32 = 3;

/// Default inactivity cutoff for inventory garbage collection.
pub const INV_GC_INACTIVE_DAYS: u32 = 30;

/// Default `purge_stale` cutoff on the Coin Inventory Server.
pub const SERVER_PURGE_STALE_MAX_AGE_DAYS: u32 = 30;

/// Default `hard_delete_fetched` grace period on the Coin Inventory Server.
pub const SERVER_HARD_DELETE_GRACE_HOURS: u32 = 1;

/// Default Postgres connection pool bounds for the Coin Inventory Server.
pub const SERVER_POOL_MIN_SIZE: u32 = 5;
pub const SERVER_POOL_MAX_SIZE: u32 = 20;
