use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::priority::Priority;
use crate::status::CoinStatus;
use crate::tier::Tier;

/// A private coin held in the Secure Vault (§3 `VaultEntry`). Owned
/// exclusively by the vault holder.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct VaultEntry {
    pub key_id: String,
    pub coin_category: Tier,
    pub encrypted_blob: Vec<u8>,
    pub encryption_iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
    pub coin_version: String,
    pub status: CoinStatus,
    pub created_at: i64,
    /// Absolute epoch-ms this entry stops being readable even by ID: set to
    /// `created_at + VAULT_KEY_TTL` on store, reset to `burned_at +
    /// VAULT_BURN_GRACE` on burn. See DESIGN.md's Open Question decision —
    /// sled has no store-native per-key TTL, so this field is the substitute.
    pub expires_at: i64,
}

/// Process-shared vault counters (§3 `VaultStats`).
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct VaultStats {
    pub active_gold: u64,
    pub active_silver: u64,
    pub active_bronze: u64,
    pub total_burned: u64,
    pub total_expired: u64,
}

impl VaultStats {
    pub fn active_for(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Gold => self.active_gold,
            Tier::Silver => self.active_silver,
            Tier::Bronze => self.active_bronze,
        }
    }

    pub fn bump_active(&mut self, tier: Tier, delta: i64) {
        let field = match tier {
            Tier::Gold => &mut self.active_gold,
            Tier::Silver => &mut self.active_silver,
            Tier::Bronze => &mut self.active_bronze,
        };
        *field = (*field as i64 + delta).max(0) as u64;
    }
}

/// Per-contact metadata in a Smart Inventory (§3 `ContactMeta`).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ContactMeta {
    pub contact_id: String,
    pub priority: Priority,
    pub last_msg_at: i64,
    pub display_name: String,
}

/// A cached public coin in a Smart Inventory (§3 `InventoryEntry`).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct InventoryEntry {
    pub contact_id: String,
    pub key_id: String,
    pub coin_category: Tier,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub fetched_at: i64,
}

/// Derived per-contact inventory summary (§3 `InventorySummary`).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct InventorySummary {
    pub contact_id: String,
    pub gold_count: u32,
    pub silver_count: u32,
    pub bronze_count: u32,
    pub priority: Priority,
}

impl InventorySummary {
    pub fn count_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Gold => self.gold_count,
            Tier::Silver => self.silver_count,
            Tier::Bronze => self.bronze_count,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.gold_count as u64 * Tier::Gold.size_bytes()
            + self.silver_count as u64 * Tier::Silver.size_bytes()
            + self.bronze_count as u64 * Tier::Bronze.size_bytes()
    }
}

/// A public coin offered for upload to the Coin Inventory Server (§3, §6).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct CoinUpload {
    pub key_id: String,
    pub coin_category: Tier,
    pub public_key_blob: Vec<u8>,
    pub signature_blob: Vec<u8>,
}

/// A coin claimed from the Coin Inventory Server's `fetch_coins` (§4.3).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct CoinRecord {
    pub key_id: String,
    pub coin_category: Tier,
    pub public_key_blob: Vec<u8>,
    pub signature_blob: Vec<u8>,
}

/// Unfetched coin counts per tier on the server (§4.3 `get_inventory_count`).
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct InventoryCount {
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
}

/// Result of a garbage-collection pass (§4.5).
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct GcResult {
    pub contacts_cleaned: u64,
    pub keys_deleted: u64,
    pub bytes_freed: u64,
}

/// Storage utilization report produced by `coin-maintenance`'s
/// `StorageReporter`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct StorageReport {
    pub total_bytes: u64,
    pub per_contact: HashMap<String, u64>,
    pub budget_bytes: u64,
    pub utilization_pct: f64,
}
