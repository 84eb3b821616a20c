use std::path::Path;

use coin_core::{CoinError, ContactMeta, InventoryEntry, Tier};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};

use crate::keys;

fn storage_err(op: &str, e: impl std::fmt::Display) -> CoinError {
    CoinError::InventoryUnavailable(format!("{op}: {e}"))
}

/// Persistent inventory database backed by sled.
///
/// Named trees:
///   meta    — contact_id                          → bincode(ContactMeta)
///   entries — len(contact)||contact||key_id        → bincode(InventoryEntry)
///   index   — len(contact)||contact||tier||score||key_id → [] (ordered set)
///   version — len(contact)||contact||tier          → u64 BE (CAS counter)
///
/// Grounded on `chronx_state::db::StateDb`'s multi-tree-per-concern layout.
/// The `index` tree substitutes for a sorted-set primitive (Redis `ZSET` in
/// the original source): membership keys are themselves score-ordered via
/// the encoding in [`crate::keys`], so "pop smallest" is a prefix scan plus
/// conditional remove (§9 "Pop semantics").
pub struct SledInventoryStore {
    _db: sled::Db,
    meta: sled::Tree,
    entries: sled::Tree,
    index: sled::Tree,
    version: sled::Tree,
}

impl SledInventoryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoinError> {
        let db = sled::open(path).map_err(|e| storage_err("open", e))?;
        let meta = db.open_tree("meta").map_err(|e| storage_err("open", e))?;
        let entries = db
            .open_tree("entries")
            .map_err(|e| storage_err("open", e))?;
        let index = db.open_tree("index").map_err(|e| storage_err("open", e))?;
        let version = db
            .open_tree("version")
            .map_err(|e| storage_err("open", e))?;
        Ok(Self {
            _db: db,
            meta,
            entries,
            index,
            version,
        })
    }

    // ── Contact meta ─────────────────────────────────────────────────────

    pub fn meta_exists(&self, contact_id: &str) -> Result<bool, CoinError> {
        self.meta
            .contains_key(keys::meta_key(contact_id))
            .map_err(|e| storage_err("register_contact", e))
    }

    pub fn get_meta(&self, contact_id: &str) -> Result<Option<ContactMeta>, CoinError> {
        match self
            .meta
            .get(keys::meta_key(contact_id))
            .map_err(|e| storage_err("get_contact_meta", e))?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(|e| {
                CoinError::InventoryUnavailable(format!("corrupt meta: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn put_meta(&self, meta: &ContactMeta) -> Result<(), CoinError> {
        let bytes = bincode::serialize(meta).map_err(|e| storage_err("put_meta", e))?;
        self.meta
            .insert(keys::meta_key(&meta.contact_id), bytes)
            .map_err(|e| storage_err("put_meta", e))?;
        Ok(())
    }

    pub fn delete_meta(&self, contact_id: &str) -> Result<(), CoinError> {
        self.meta
            .remove(keys::meta_key(contact_id))
            .map_err(|e| storage_err("delete_meta", e))?;
        Ok(())
    }

    pub fn iter_contact_ids(&self) -> Result<Vec<String>, CoinError> {
        let mut out = Vec::new();
        for item in self.meta.iter() {
            let (key, _) = item.map_err(|e| storage_err("scan_contacts", e))?;
            out.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(out)
    }

    // ── Index cardinality / version ──────────────────────────────────────

    pub fn count_index(&self, contact_id: &str, tier: Tier) -> Result<usize, CoinError> {
        let prefix = keys::index_prefix(contact_id, tier);
        Ok(self.index.scan_prefix(prefix).count())
    }

    fn read_version(&self, contact_id: &str, tier: Tier) -> Result<u64, CoinError> {
        let key = keys::version_key(contact_id, tier);
        match self
            .version
            .get(key)
            .map_err(|e| storage_err("store_key", e))?
        {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    // ── Optimistic store_key commit ───────────────────────────────────────

    /// Attempt one optimistic-concurrency commit of a new `InventoryEntry`,
    /// conditional on the tier's version counter matching `expected_version`.
    /// Returns `Ok(true)` on commit, `Ok(false)` if the version had already
    /// moved (caller should re-observe and retry).
    pub fn try_store(
        &self,
        entry: &InventoryEntry,
        expected_version: u64,
    ) -> Result<bool, CoinError> {
        let ekey = keys::entries_key(&entry.contact_id, &entry.key_id);
        let ikey = keys::index_key(
            &entry.contact_id,
            entry.coin_category,
            entry.fetched_at,
            &entry.key_id,
        );
        let vkey = keys::version_key(&entry.contact_id, entry.coin_category);
        let entry_bytes = bincode::serialize(entry).map_err(|e| storage_err("store_key", e))?;

        let result = (&self.entries, &self.index, &self.version).transaction(
            move |(entries_tx, index_tx, version_tx)| {
                let current = version_tx
                    .get(vkey.as_slice())?
                    .map(|b| {
                        let mut arr = [0u8; 8];
                        arr.copy_from_slice(&b);
                        u64::from_be_bytes(arr)
                    })
                    .unwrap_or(0);
                if current != expected_version {
                    return Err(ConflictableTransactionError::Abort(()));
                }
                entries_tx.insert(ekey.as_slice(), entry_bytes.as_slice())?;
                index_tx.insert(ikey.as_slice(), &[][..])?;
                version_tx.insert(vkey.as_slice(), &(current + 1).to_be_bytes())?;
                Ok(())
            },
        );

        match result {
            Ok(()) => Ok(true),
            Err(TransactionError::Abort(())) => Ok(false),
            Err(e) => Err(storage_err("store_key", e)),
        }
    }

    /// Validate-then-commit loop implementing §4.2's optimistic transaction.
    /// Returns `BudgetExceeded` if the cap is hit on any observation, or
    /// `Concurrency` if every retry loses the race.
    pub fn store_with_budget(
        &self,
        entry: InventoryEntry,
        cap: u32,
        max_retries: u32,
    ) -> Result<(), CoinError> {
        for _ in 0..max_retries {
            let version_before = self.read_version(&entry.contact_id, entry.coin_category)?;
            let count = self.count_index(&entry.contact_id, entry.coin_category)?;
            if count as u32 >= cap {
                return Err(CoinError::BudgetExceeded {
                    contact_id: entry.contact_id.clone(),
                    tier: entry.coin_category.to_string(),
                    current: count as u32,
                    cap,
                });
            }
            if self.try_store(&entry, version_before)? {
                return Ok(());
            }
            // version moved underneath us — observe again and retry.
        }
        Err(CoinError::Concurrency("store_key".to_string()))
    }

    // ── Pop (select_coin) ─────────────────────────────────────────────────

    /// Pop the oldest (smallest `fetched_at`) entry for `(contact_id, tier)`,
    /// removing both the index membership and the entry record. Index is
    /// removed first so concurrent observers never see an index entry whose
    /// record is missing (§5 "Shared-resource policy").
    pub fn pop_oldest(
        &self,
        contact_id: &str,
        tier: Tier,
    ) -> Result<Option<InventoryEntry>, CoinError> {
        let prefix = keys::index_prefix(contact_id, tier);
        loop {
            let candidate = self
                .index
                .scan_prefix(&prefix)
                .next()
                .transpose()
                .map_err(|e| storage_err("select_coin", e))?;
            let Some((idx_key, _)) = candidate else {
                return Ok(None);
            };
            let removed = self
                .index
                .remove(idx_key.clone())
                .map_err(|e| storage_err("select_coin", e))?;
            if removed.is_none() {
                // another selector already popped this member; rescan.
                continue;
            }
            let key_id = keys::key_id_from_index_key(&idx_key, prefix.len());
            let ekey = keys::entries_key(contact_id, &key_id);
            let entry_bytes = self
                .entries
                .remove(ekey)
                .map_err(|e| storage_err("select_coin", e))?;
            return match entry_bytes {
                Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(|e| {
                    CoinError::InventoryUnavailable(format!("corrupt entry: {e}"))
                })?)),
                None => Ok(None),
            };
        }
    }

    /// Pop the `count` newest (largest `fetched_at`) entries for
    /// `(contact_id, tier)` — the priority-downgrade trim's explicit
    /// newest-first eviction policy (§4.2).
    pub fn pop_newest_n(
        &self,
        contact_id: &str,
        tier: Tier,
        count: usize,
    ) -> Result<usize, CoinError> {
        let prefix = keys::index_prefix(contact_id, tier);
        let mut evicted = 0;
        for _ in 0..count {
            let candidate = self
                .index
                .scan_prefix(&prefix)
                .next_back()
                .transpose()
                .map_err(|e| storage_err("trim_excess", e))?;
            let Some((idx_key, _)) = candidate else {
                break;
            };
            self.index
                .remove(idx_key.clone())
                .map_err(|e| storage_err("trim_excess", e))?;
            let key_id = keys::key_id_from_index_key(&idx_key, prefix.len());
            self.entries
                .remove(keys::entries_key(contact_id, &key_id))
                .map_err(|e| storage_err("trim_excess", e))?;
            evicted += 1;
        }
        Ok(evicted)
    }

    /// Remove every cached entry across all tiers for a contact, clearing
    /// the index trees. Used by garbage collection.
    pub fn clear_contact(&self, contact_id: &str) -> Result<u64, CoinError> {
        let mut deleted = 0u64;
        for tier in Tier::ALL {
            let prefix = keys::index_prefix(contact_id, tier);
            let idx_keys: Vec<Vec<u8>> = self
                .index
                .scan_prefix(&prefix)
                .map(|r| r.map(|(k, _)| k.to_vec()))
                .collect::<Result<_, _>>()
                .map_err(|e| storage_err("garbage_collect", e))?;
            for idx_key in idx_keys {
                let key_id = keys::key_id_from_index_key(&idx_key, prefix.len());
                self.index
                    .remove(idx_key)
                    .map_err(|e| storage_err("garbage_collect", e))?;
                self.entries
                    .remove(keys::entries_key(contact_id, &key_id))
                    .map_err(|e| storage_err("garbage_collect", e))?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Read an entry by `(contact_id, key_id)` without removing it.
    pub fn get_entry(
        &self,
        contact_id: &str,
        key_id: &str,
    ) -> Result<Option<InventoryEntry>, CoinError> {
        match self
            .entries
            .get(keys::entries_key(contact_id, key_id))
            .map_err(|e| storage_err("consume_key", e))?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(|e| {
                CoinError::InventoryUnavailable(format!("corrupt entry: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    /// Delete an entry AND its index membership atomically (both or
    /// neither). §9 "`consume_key` scoring field": removal is keyed by
    /// `key_id`, the intended behavior.
    pub fn consume(&self, entry: &InventoryEntry) -> Result<(), CoinError> {
        let ekey = keys::entries_key(&entry.contact_id, &entry.key_id);
        let ikey = keys::index_key(
            &entry.contact_id,
            entry.coin_category,
            entry.fetched_at,
            &entry.key_id,
        );

        (&self.entries, &self.index)
            .transaction(move |(entries_tx, index_tx)| {
                entries_tx.remove(ekey.as_slice())?;
                index_tx.remove(ikey.as_slice())?;
                Ok(())
            })
            .map_err(|e: TransactionError<()>| storage_err("consume_key", e))
    }
}
