use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use coin_core::constants::INV_OPTIMISTIC_LOCK_RETRIES;
use coin_core::{caps_for, CoinError, ContactMeta, InventoryEntry, InventorySummary, Priority, Tier};

use crate::store::SledInventoryStore;
use crate::trim;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

/// Per-contact cache of fetched public coins, budget-enforced (§4.2). One
/// instance per local peer; `contact_id` scopes every operation.
pub struct SmartInventory {
    store: SledInventoryStore,
}

impl SmartInventory {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoinError> {
        Ok(Self {
            store: SledInventoryStore::open(path)?,
        })
    }

    /// Register a contact. No-op (`false`) if already registered.
    pub fn register_contact(
        &self,
        contact_id: &str,
        priority: &str,
        display_name: Option<&str>,
    ) -> Result<bool, CoinError> {
        let priority = Priority::parse(priority)?;
        if self.store.meta_exists(contact_id)? {
            return Ok(false);
        }
        self.store.put_meta(&ContactMeta {
            contact_id: contact_id.to_string(),
            priority,
            last_msg_at: now_ms(),
            display_name: display_name.unwrap_or("").to_string(),
        })?;
        Ok(true)
    }

    /// Change a contact's priority. Triggers trim on downgrade (§4.2).
    pub fn set_contact_priority(&self, contact_id: &str, new_priority: &str) -> Result<bool, CoinError> {
        let new_priority = Priority::parse(new_priority)?;
        let mut meta = self
            .store
            .get_meta(contact_id)?
            .ok_or_else(|| CoinError::ContactNotRegistered(contact_id.to_string()))?;

        if meta.priority == new_priority {
            return Ok(true);
        }

        let is_downgrade = meta.priority.is_downgrade_to(new_priority);
        meta.priority = new_priority;
        self.store.put_meta(&meta)?;

        if is_downgrade {
            trim::trim_excess(&self.store, contact_id, new_priority)?;
        }
        Ok(true)
    }

    pub fn get_contact_meta(&self, contact_id: &str) -> Result<Option<ContactMeta>, CoinError> {
        self.store.get_meta(contact_id)
    }

    /// Cache a fetched public coin under budget discipline (§4.2 "optimistic
    /// transaction"). `INV_OPTIMISTIC_LOCK_RETRIES` observe→commit attempts;
    /// exhausting them surfaces `Concurrency`.
    pub fn store_key(
        &self,
        contact_id: &str,
        key_id: &str,
        coin_category: &str,
        public_key: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<(), CoinError> {
        let tier = Tier::parse(coin_category)?;
        let meta = self
            .store
            .get_meta(contact_id)?
            .ok_or_else(|| CoinError::ContactNotRegistered(contact_id.to_string()))?;
        let cap = caps_for(meta.priority).for_tier(tier);
        if cap == 0 {
            return Err(CoinError::BudgetExceeded {
                contact_id: contact_id.to_string(),
                tier: tier.to_string(),
                current: 0,
                cap: 0,
            });
        }

        let entry = InventoryEntry {
            contact_id: contact_id.to_string(),
            key_id: key_id.to_string(),
            coin_category: tier,
            public_key,
            signature,
            fetched_at: now_ms(),
        };
        self.store
            .store_with_budget(entry, cap, INV_OPTIMISTIC_LOCK_RETRIES)
    }

    /// Select a coin for `desired_tier`, falling back downward through
    /// [`coin_core::tier_fallback`] if the desired tier is empty. Never
    /// selects a higher tier than requested.
    pub fn select_coin(
        &self,
        contact_id: &str,
        desired_tier: &str,
    ) -> Result<Option<InventoryEntry>, CoinError> {
        let desired = Tier::parse(desired_tier)?;
        if !self.store.meta_exists(contact_id)? {
            return Err(CoinError::ContactNotRegistered(contact_id.to_string()));
        }

        for tier in coin_core::budget::selection_order(desired) {
            if let Some(entry) = self.store.pop_oldest(contact_id, tier)? {
                if let Some(mut meta) = self.store.get_meta(contact_id)? {
                    meta.last_msg_at = now_ms();
                    self.store.put_meta(&meta)?;
                }
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Remove a cached coin by id regardless of FIFO order. Not used for
    /// selection. Returns `false` if absent.
    pub fn consume_key(&self, contact_id: &str, key_id: &str) -> Result<bool, CoinError> {
        let Some(entry) = self.store.get_entry(contact_id, key_id)? else {
            return Ok(false);
        };
        self.store.consume(&entry)?;
        Ok(true)
    }

    fn summarize(&self, contact_id: &str, meta: &ContactMeta) -> Result<InventorySummary, CoinError> {
        Ok(InventorySummary {
            contact_id: contact_id.to_string(),
            gold_count: self.store.count_index(contact_id, Tier::Gold)? as u32,
            silver_count: self.store.count_index(contact_id, Tier::Silver)? as u32,
            bronze_count: self.store.count_index(contact_id, Tier::Bronze)? as u32,
            priority: meta.priority,
        })
    }

    pub fn get_inventory(
        &self,
        contact_id: &str,
    ) -> Result<InventorySummary, CoinError> {
        let meta = self
            .store
            .get_meta(contact_id)?
            .ok_or_else(|| CoinError::ContactNotRegistered(contact_id.to_string()))?;
        self.summarize(contact_id, &meta)
    }

    pub fn get_all_inventories(&self) -> Result<HashMap<String, InventorySummary>, CoinError> {
        let mut out = HashMap::new();
        for contact_id in self.store.iter_contact_ids()? {
            if let Some(meta) = self.store.get_meta(&contact_id)? {
                out.insert(contact_id.clone(), self.summarize(&contact_id, &meta)?);
            }
        }
        Ok(out)
    }

    pub fn has_keys_for(&self, contact_id: &str) -> Result<bool, CoinError> {
        for tier in Tier::ALL {
            if self.store.count_index(contact_id, tier)? > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn get_available_tiers(&self, contact_id: &str) -> Result<Vec<Tier>, CoinError> {
        let mut out = Vec::new();
        for tier in Tier::ALL {
            if self.store.count_index(contact_id, tier)? > 0 {
                out.push(tier);
            }
        }
        Ok(out)
    }

    /// Back-door accessor for `coin-maintenance`'s garbage collector, which
    /// needs direct store access to clear a contact's cached coins.
    pub fn store(&self) -> &SledInventoryStore {
        &self.store
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
    fn register_contact_is_idempotent_once() {
        let (inv, _dir) = open_inv();
        assert!(inv.register_contact("bob", "BESTIE", None).unwrap());
        assert!(!inv.register_contact("bob", "BESTIE", None).unwrap());
    }

    #[test]
    fn budget_zero_tier_rejected() {
        let (inv, _dir) = open_inv();
        inv.register_contact("stranger", "STRANGER", None).unwrap();
        let err = inv
            .store_key("stranger", "k1", "BRONZE", vec![], vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            CoinError::BudgetExceeded { current: 0, cap: 0, .. }
        ));
    }

    #[test]
    fn cap_enforced_exactly() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        for i in 0..5 {
            inv.store_key("bob", &format!("k{i}"), "GOLD", vec![], vec![])
                .unwrap();
        }
        let err = inv.store_key("bob", "k5", "GOLD", vec![], vec![]).unwrap_err();
        assert!(matches!(err, CoinError::BudgetExceeded { current: 5, cap: 5, .. }));

        assert_eq!(inv.get_inventory("bob").unwrap().gold_count, 5);
    }

    #[test]
    fn fallback_path_scenario_c() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        inv.store_key("bob", "s1", "SILVER", vec![], vec![]).unwrap();

        let entry = inv.select_coin("bob", "GOLD").unwrap().unwrap();
        assert_eq!(entry.coin_category, Tier::Silver);

        assert!(inv.select_coin("bob", "BRONZE").unwrap().is_none());
    }

    #[test]
    fn select_never_goes_upward() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        inv.store_key("bob", "g1", "GOLD", vec![], vec![]).unwrap();
        assert!(inv.select_coin("bob", "BRONZE").unwrap().is_none());
        assert_eq!(inv.get_inventory("bob").unwrap().gold_count, 1);
    }

    #[test]
    fn downgrade_trims_to_new_cap_keeping_oldest() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        for i in 0..4 {
            inv.store_key("bob", &format!("s{i}"), "SILVER", vec![], vec![])
                .unwrap();
        }
        // MATE cap for SILVER is 6, so downgrade to MATE first (no trim),
        // then to STRANGER (cap 0) to force trimming to zero and check
        // fallback ordering via selection afterwards is moot once trimmed.
        inv.set_contact_priority("bob", "STRANGER").unwrap();
        assert_eq!(inv.get_inventory("bob").unwrap().silver_count, 0);
    }

    #[test]
    fn consume_key_removes_by_id() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();
        inv.store_key("bob", "b1", "BRONZE", vec![], vec![]).unwrap();
        assert!(inv.consume_key("bob", "b1").unwrap());
        assert!(!inv.consume_key("bob", "b1").unwrap());
        assert_eq!(inv.get_inventory("bob").unwrap().bronze_count, 0);
    }

    #[test]
    fn store_key_requires_registered_contact() {
        let (inv, _dir) = open_inv();
        let err = inv
            .store_key("ghost", "k1", "GOLD", vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, CoinError::ContactNotRegistered(_)));
    }

    /// Scenario A (§8): 10 concurrent `store_key` calls against a BESTIE
    /// contact's GOLD cap of 5 — exactly 5 must succeed.
    #[test]
    fn concurrent_cap_enforcement_scenario_a() {
        let (inv, _dir) = open_inv();
        inv.register_contact("bob", "BESTIE", None).unwrap();

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..10)
                .map(|i| {
                    let inv = &inv;
                    scope.spawn(move || {
                        inv.store_key("bob", &format!("k{i}"), "GOLD", vec![], vec![])
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 5);
        assert_eq!(inv.get_inventory("bob").unwrap().gold_count, 5);
    }
}
