pub mod budget;
pub mod constants;
pub mod error;
pub mod model;
pub mod priority;
pub mod status;
pub mod tier;

pub use budget::{caps_for, tier_fallback, BudgetCaps, BUDGET_CAPS};
pub use error::CoinError;
pub use model::{
    ContactMeta, CoinRecord, CoinUpload, GcResult, InventoryCount, InventoryEntry,
    InventorySummary, StorageReport, VaultEntry, VaultStats,
};
pub use priority::Priority;
pub use status::CoinStatus;
pub use tier::Tier;
