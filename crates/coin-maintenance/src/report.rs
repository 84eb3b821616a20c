use std::collections::HashMap;

use coin_core::{caps_for, CoinError, Priority, StorageReport, Tier, VaultStats};
use coin_inventory::SmartInventory;
use coin_vault::SecureVault;

/// Aggregated storage/replenishment dashboard. **[SUPPLEMENT]**: dropped by
/// the spec distillation, restored here since it adds no new invariants —
/// pure aggregation over already-specified reads. Grounded on
/// `original_source/AQM_Database/aqm_db/stats.py::StorageReporter`.
pub struct StorageReporter<'a> {
    vault: &'a SecureVault,
    inventory: &'a SmartInventory,
}

/// Full dashboard snapshot: vault counters, inventory storage utilization,
/// and per-contact replenishment deficits.
pub struct Dashboard {
    pub vault: VaultStats,
    pub inventory_storage: StorageReport,
    pub replenish_needs: HashMap<String, HashMap<Tier, u32>>,
}

impl<'a> StorageReporter<'a> {
    pub fn new(vault: &'a SecureVault, inventory: &'a SmartInventory) -> Self {
        Self { vault, inventory }
    }

    pub fn get_storage_usage(&self) -> Result<StorageReport, CoinError> {
        let summaries = self.inventory.get_all_inventories()?;
        let mut total_bytes = 0u64;
        let mut per_contact = HashMap::new();

        for (contact_id, summary) in summaries {
            let bytes = summary.total_bytes();
            per_contact.insert(contact_id, bytes);
            total_bytes += bytes;
        }

        let budget = coin_core::constants::INV_MAX_STORAGE_BYTES;
        let utilization_pct = if budget > 0 {
            (total_bytes as f64 / budget as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };

        Ok(StorageReport {
            total_bytes,
            per_contact,
            budget_bytes: budget,
            utilization_pct,
        })
    }

    pub fn get_vault_report(&self) -> Result<VaultStats, CoinError> {
        self.vault.get_stats()
    }

    /// Per-contact per-tier deficit against budget caps, skipping
    /// `STRANGER` contacts (whose caps are all zero by definition).
    pub fn get_replenish_needs(&self) -> Result<HashMap<String, HashMap<Tier, u32>>, CoinError> {
        let summaries = self.inventory.get_all_inventories()?;
        let mut needs = HashMap::new();

        for (contact_id, summary) in summaries {
            if summary.priority == Priority::Stranger {
                continue;
            }
            let caps = caps_for(summary.priority);
            let mut deficit = HashMap::new();
            for tier in Tier::ALL {
                let d = caps.for_tier(tier).saturating_sub(summary.count_for(tier));
                if d > 0 {
                    deficit.insert(tier, d);
                }
            }
            if !deficit.is_empty() {
                needs.insert(contact_id, deficit);
            }
        }

        Ok(needs)
    }

    pub fn get_full_dashboard(&self) -> Result<Dashboard, CoinError> {
        Ok(Dashboard {
            vault: self.get_vault_report()?,
            inventory_storage: self.get_storage_usage()?,
            replenish_needs: self.get_replenish_needs()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn storage_usage_sums_across_contacts() {
        let vdir = tempdir().unwrap();
        let idir = tempdir().unwrap();
        let vault = SecureVault::open(vdir.path()).unwrap();
        let inv = SmartInventory::open(idir.path()).unwrap();

        inv.register_contact("bob", "BESTIE", None).unwrap();
        inv.store_key("bob", "g1", "GOLD", vec![], vec![]).unwrap();

        let reporter = StorageReporter::new(&vault, &inv);
        let report = reporter.get_storage_usage().unwrap();
        assert_eq!(report.total_bytes, Tier::Gold.size_bytes());
        assert_eq!(report.budget_bytes, coin_core::constants::INV_MAX_STORAGE_BYTES);
    }

    #[test]
    fn replenish_needs_skips_stranger() {
        let vdir = tempdir().unwrap();
        let idir = tempdir().unwrap();
        let vault = SecureVault::open(vdir.path()).unwrap();
        let inv = SmartInventory::open(idir.path()).unwrap();

        inv.register_contact("stranger1", "STRANGER", None).unwrap();
        inv.register_contact("mate1", "MATE", None).unwrap();

        let reporter = StorageReporter::new(&vault, &inv);
        let needs = reporter.get_replenish_needs().unwrap();
        assert!(!needs.contains_key("stranger1"));
        assert!(needs.contains_key("mate1"));
    }
}
