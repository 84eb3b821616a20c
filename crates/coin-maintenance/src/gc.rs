use std::time::{SystemTime, UNIX_EPOCH};

use coin_core::{CoinError, ContactMeta, GcResult, Priority, Tier};
use coin_inventory::SmartInventory;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

fn is_inactive(last_msg_at: i64, inactive_days: u32, now: i64) -> bool {
    let cutoff = now - (inactive_days as i64) * 86_400 * 1000;
    last_msg_at < cutoff
}

/// Garbage collection of inactive contacts (§4.5). Grounded on
/// `original_source/AQM_Database/aqm_db/garbage_collector.py::GarbageCollector`.
pub struct InventoryGc<'a> {
    inventory: &'a SmartInventory,
}

impl<'a> InventoryGc<'a> {
    pub fn new(inventory: &'a SmartInventory) -> Self {
        Self { inventory }
    }

    fn bytes_for(&self, contact_id: &str) -> Result<u64, CoinError> {
        let summary = self.inventory.get_inventory(contact_id)?;
        Ok(summary.total_bytes())
    }

    /// Delete every cached entry across all tiers for `contact_id`, then
    /// reset priority to `STRANGER`. Returns keys deleted.
    fn clean_contact(&self, meta: &ContactMeta) -> Result<u64, CoinError> {
        let deleted = self.inventory.store().clear_contact(&meta.contact_id)?;
        self.inventory
            .set_contact_priority(&meta.contact_id, Priority::Stranger.as_str())?;
        Ok(deleted)
    }

    /// Sweep every registered contact whose `last_msg_at` is older than
    /// `inactive_days`, clearing their cache and resetting priority.
    pub fn garbage_collect(&self, inactive_days: u32) -> Result<GcResult, CoinError> {
        let now = now_ms();
        let mut result = GcResult::default();

        for contact_id in self.inventory.store().iter_contact_ids()? {
            let Some(meta) = self.inventory.get_contact_meta(&contact_id)? else {
                continue;
            };
            if !is_inactive(meta.last_msg_at, inactive_days, now) {
                continue;
            }

            result.bytes_freed += self.bytes_for(&contact_id)?;
            result.keys_deleted += self.clean_contact(&meta)?;
            result.contacts_cleaned += 1;
        }

        Ok(result)
    }

    /// Same scan and computation as [`Self::garbage_collect`] without
    /// mutating any state.
    pub fn dry_run(&self, inactive_days: u32) -> Result<GcResult, CoinError> {
        let now = now_ms();
        let mut result = GcResult::default();

        for contact_id in self.inventory.store().iter_contact_ids()? {
            let Some(meta) = self.inventory.get_contact_meta(&contact_id)? else {
                continue;
            };
            if !is_inactive(meta.last_msg_at, inactive_days, now) {
                continue;
            }

            let summary = self.inventory.get_inventory(&contact_id)?;
            let tier_count =
                summary.gold_count + summary.silver_count + summary.bronze_count;
            result.keys_deleted += tier_count as u64;
            result.bytes_freed += summary.total_bytes();
            result.contacts_cleaned += 1;
        }

        Ok(result)
    }

    /// Clean a single contact regardless of activity. Fails with
    /// `NotRegistered` (`ContactNotRegistered`) if unknown.
    pub fn collect_single_contact(&self, contact_id: &str) -> Result<GcResult, CoinError> {
        let meta = self
            .inventory
            .get_contact_meta(contact_id)?
            .ok_or_else(|| CoinError::ContactNotRegistered(contact_id.to_string()))?;

        let bytes_freed = self.bytes_for(contact_id)?;
        let keys_deleted = self.clean_contact(&meta)?;

        Ok(GcResult {
            contacts_cleaned: 1,
            keys_deleted,
            bytes_freed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_inv() -> (SmartInventory, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (SmartInventory::open(dir.path()).unwrap(), dir)
    }

    #[test]
    fn inactive_gc_scenario_f() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        inv.store_key("bob", "s1", "SILVER", vec![], vec![]).unwrap();
        inv.store_key("bob", "s2", "SILVER", vec![], vec![]).unwrap();
        inv.store_key("bob", "s3", "SILVER", vec![], vec![]).unwrap();

        // Rewrite last_msg_at to 31 days ago.
        let mut meta = inv.get_contact_meta("bob").unwrap().unwrap();
        meta.last_msg_at = now_ms() - 31 * 86_400 * 1000;
        inv.store().put_meta(&meta).unwrap();

        let gc = InventoryGc::new(&inv);
        let result = gc.garbage_collect(30).unwrap();

        assert_eq!(result.contacts_cleaned, 1);
        assert_eq!(result.keys_deleted, 3);
        assert_eq!(result.bytes_freed, 3 * Tier::Silver.size_bytes());

        assert_eq!(
            inv.get_contact_meta("bob").unwrap().unwrap().priority,
            Priority::Stranger
        );
        assert!(!inv.has_keys_for("bob").unwrap());
    }

    #[test]
    fn dry_run_does_not_mutate() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        inv.store_key("bob", "g1", "GOLD", vec![], vec![]).unwrap();
        let mut meta = inv.get_contact_meta("bob").unwrap().unwrap();
        meta.last_msg_at = now_ms() - 31 * 86_400 * 1000;
        inv.store().put_meta(&meta).unwrap();

        let gc = InventoryGc::new(&inv);
        let result = gc.dry_run(30).unwrap();
        assert_eq!(result.contacts_cleaned, 1);
        assert_eq!(result.keys_deleted, 1);

        // Unchanged after dry run.
        assert!(inv.has_keys_for("bob").unwrap());
        assert_eq!(
            inv.get_contact_meta("bob").unwrap().unwrap().priority,
            Priority::Bestie
        );
    }

    #[test]
    fn collect_single_contact_ignores_activity() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        inv.store_key("bob", "g1", "GOLD", vec![], vec![]).unwrap();

        let gc = InventoryGc::new(&inv);
        let result = gc.collect_single_contact("bob").unwrap();
        assert_eq!(result.contacts_cleaned, 1);
        assert_eq!(result.keys_deleted, 1);
        assert!(!inv.has_keys_for("bob").unwrap());
    }

    #[test]
    fn collect_single_contact_unknown_errors() {
        let (inv, _dir) = open_inv();
        let gc = InventoryGc::new(&inv);
        let err = gc.collect_single_contact("ghost").unwrap_err();
        assert!(matches!(err, CoinError::ContactNotRegistered(_)));
    }
}
