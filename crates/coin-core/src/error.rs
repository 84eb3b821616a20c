use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoinError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("invalid coin category: {0}")]
    InvalidCoinCategory(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    // ── Vault identity/state ─────────────────────────────────────────────────
    #[error("key already exists: {0}")]
    KeyAlreadyExists(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key already burned: {0}")]
    KeyAlreadyBurned(String),

    // ── Inventory ─────────────────────────────────────────────────────────────
    #[error("contact not registered: {0}")]
    ContactNotRegistered(String),

    #[error("budget exceeded for {contact_id}/{tier}: {current}/{cap}")]
    BudgetExceeded {
        contact_id: String,
        tier: String,
        current: u32,
        cap: u32,
    },

    #[error("optimistic lock failed after max retries: {0}")]
    Concurrency(String),

    // ── Backing-store outages ────────────────────────────────────────────────
    #[error("vault unavailable during {0}")]
    VaultUnavailable(String),

    #[error("inventory unavailable during {0}")]
    InventoryUnavailable(String),

    // ── Coin Inventory Server ────────────────────────────────────────────────
    #[error("upload failed: {0}")]
    UploadError(String),

    #[error("fetch failed: {0}")]
    FetchError(String),

    #[error("server database error during {0}: {1}")]
    ServerDatabaseError(String, String),

    #[error("connection pool error: {0}")]
    ConnectionPoolError(String),
}

impl CoinError {
    /// HTTP status code §6 maps each error family to. Validation errors are
    /// 422; backing-store/database outages are 500.
    pub fn http_status(&self) -> u16 {
        match self {
            CoinError::InvalidCoinCategory(_) | CoinError::InvalidPriority(_) => 422,
            CoinError::ContactNotRegistered(_)
            | CoinError::BudgetExceeded { .. }
            | CoinError::Concurrency(_)
            | CoinError::KeyAlreadyExists(_)
            | CoinError::KeyAlreadyBurned(_) => 409,
            CoinError::KeyNotFound(_) => 404,
            _ => 500,
        }
    }
}
