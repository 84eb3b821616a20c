use std::path::Path;

use coin_core::{CoinError, CoinStatus, Tier, VaultEntry, VaultStats};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};

const STATS_KEY: &[u8] = b"stats";

/// Persistent vault database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   entries — key_id bytes       → bincode(VaultEntry)
///   stats   — fixed "stats" key  → bincode(VaultStats)
///
/// Grounded on `chronx_state::db::StateDb`'s single-`sled::Db`-with-named-trees
/// layout. The vault's three spec-mandated atomic groups (`store_key`,
/// `burn_key`, `purge_expired` per-entry) use sled's native multi-tree
/// `Transactional` impl rather than `StateDb`'s stage-then-sequential-commit
/// pattern, since §4.1 requires the data record and counter update to commit
/// together or not at all — a guarantee a non-transactional sequence of
/// `insert` calls cannot give under concurrent vault access from parallel
/// worker threads (§5).
pub struct SledVaultStore {
    _db: sled::Db,
    entries: sled::Tree,
    stats: sled::Tree,
}

fn storage_err(op: &str, e: impl std::fmt::Display) -> CoinError {
    CoinError::VaultUnavailable(format!("{op}: {e}"))
}

impl SledVaultStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoinError> {
        let db = sled::open(path).map_err(|e| storage_err("open", e))?;
        let entries = db
            .open_tree("entries")
            .map_err(|e| storage_err("open", e))?;
        let stats = db.open_tree("stats").map_err(|e| storage_err("open", e))?;
        Ok(Self {
            _db: db,
            entries,
            stats,
        })
    }

    fn read_stats(&self) -> Result<VaultStats, CoinError> {
        match self
            .stats
            .get(STATS_KEY)
            .map_err(|e| storage_err("get_stats", e))?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| CoinError::VaultUnavailable(format!("corrupt stats: {e}"))),
            None => Ok(VaultStats::default()),
        }
    }

    pub fn exists(&self, key_id: &str) -> Result<bool, CoinError> {
        self.entries
            .contains_key(key_id.as_bytes())
            .map_err(|e| storage_err("exists", e))
    }

    pub fn get(&self, key_id: &str) -> Result<Option<VaultEntry>, CoinError> {
        match self
            .entries
            .get(key_id.as_bytes())
            .map_err(|e| storage_err("get", e))?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(|e| {
                CoinError::VaultUnavailable(format!("corrupt entry: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn get_stats(&self) -> Result<VaultStats, CoinError> {
        self.read_stats()
    }

    pub fn iter_entries(&self) -> Result<Vec<VaultEntry>, CoinError> {
        let mut out = Vec::new();
        for item in self.entries.iter() {
            let (_, bytes) = item.map_err(|e| storage_err("scan", e))?;
            out.push(
                bincode::deserialize(&bytes)
                    .map_err(|e| CoinError::VaultUnavailable(format!("corrupt entry: {e}")))?,
            );
        }
        Ok(out)
    }

    /// Insert a fresh `ACTIVE` entry and bump `active_<tier>`, atomically.
    /// The `AlreadyExists` check runs *inside* the transaction closure, not
    /// before it — two racing `store_key` calls for the same `key_id` must
    /// produce exactly one success and one `KeyAlreadyExists`, not two
    /// unconditional overwrites (§5 "globally serializable per key_id").
    pub fn insert_active(&self, entry: VaultEntry) -> Result<(), CoinError> {
        let entry_bytes =
            bincode::serialize(&entry).map_err(|e| storage_err("store_key", e))?;
        let tier = entry.coin_category;
        let key = entry.key_id.clone().into_bytes();
        let key_id = entry.key_id.clone();

        let result = (&self.entries, &self.stats).transaction(move |(entries_tx, stats_tx)| {
            if entries_tx.get(key.as_slice())?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    CoinError::KeyAlreadyExists(key_id.clone()),
                ));
            }

            let mut stats: VaultStats = stats_tx
                .get(STATS_KEY)?
                .map(|b| bincode::deserialize(&b).unwrap_or_default())
                .unwrap_or_default();
            stats.bump_active(tier, 1);
            let stats_bytes = bincode::serialize(&stats).map_err(|e| {
                ConflictableTransactionError::Abort(CoinError::VaultUnavailable(e.to_string()))
            })?;
            entries_tx.insert(key.as_slice(), entry_bytes.as_slice())?;
            stats_tx.insert(STATS_KEY, stats_bytes)?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(e) => Err(storage_err("store_key", e)),
        }
    }

    /// Transition an `ACTIVE` entry to `BURNED`, adjusting counters
    /// atomically. The status check — `NotFound` if absent, `AlreadyBurned`
    /// if already `BURNED` — runs inside the same transaction as the
    /// mutation, so the decision and the `active_<tier>-=1`/`total_burned+=1`
    /// update are one atomic group: two racing `burn_key` calls on the same
    /// `key_id` can never both observe `ACTIVE` and both commit (§5 "globally
    /// serializable per key_id", Scenario D).
    pub fn burn(&self, key_id: &str, grace_expires_at: i64) -> Result<(), CoinError> {
        let key = key_id.as_bytes().to_vec();
        let key_id = key_id.to_string();

        let result = (&self.entries, &self.stats).transaction(move |(entries_tx, stats_tx)| {
            let Some(bytes) = entries_tx.get(key.as_slice())? else {
                return Err(ConflictableTransactionError::Abort(CoinError::KeyNotFound(
                    key_id.clone(),
                )));
            };
            let mut entry: VaultEntry = bincode::deserialize(&bytes).map_err(|e| {
                ConflictableTransactionError::Abort(CoinError::VaultUnavailable(format!(
                    "corrupt entry: {e}"
                )))
            })?;
            if entry.status == CoinStatus::Burned {
                return Err(ConflictableTransactionError::Abort(
                    CoinError::KeyAlreadyBurned(key_id.clone()),
                ));
            }
            let tier = entry.coin_category;
            entry.status = CoinStatus::Burned;
            entry.expires_at = grace_expires_at;
            let entry_bytes = bincode::serialize(&entry).map_err(|e| {
                ConflictableTransactionError::Abort(CoinError::VaultUnavailable(e.to_string()))
            })?;

            let mut stats: VaultStats = stats_tx
                .get(STATS_KEY)?
                .map(|b| bincode::deserialize(&b).unwrap_or_default())
                .unwrap_or_default();
            stats.bump_active(tier, -1);
            stats.total_burned += 1;
            let stats_bytes = bincode::serialize(&stats).map_err(|e| {
                ConflictableTransactionError::Abort(CoinError::VaultUnavailable(e.to_string()))
            })?;

            entries_tx.insert(key.as_slice(), entry_bytes.as_slice())?;
            stats_tx.insert(STATS_KEY, stats_bytes)?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(e) => Err(storage_err("burn_key", e)),
        }
    }

    /// Delete an `ACTIVE` entry and bump `active_<tier>-=1`/`total_expired+=1`,
    /// atomically. Used by `purge_expired`.
    pub fn delete_expired(&self, key_id: &str, tier: Tier) -> Result<(), CoinError> {
        let key = key_id.as_bytes().to_vec();

        (&self.entries, &self.stats)
            .transaction(move |(entries_tx, stats_tx)| {
                entries_tx.remove(key.as_slice())?;

                let mut stats: VaultStats = stats_tx
                    .get(STATS_KEY)?
                    .map(|b| bincode::deserialize(&b).unwrap_or_default())
                    .unwrap_or_default();
                stats.bump_active(tier, -1);
                stats.total_expired += 1;
                let stats_bytes = bincode::serialize(&stats)
                    .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?;
                stats_tx.insert(STATS_KEY, stats_bytes)?;
                Ok(())
            })
            .map_err(|e: TransactionError<String>| storage_err("purge_expired", e))
    }

    /// Hard-delete a `BURNED` entry whose grace window has elapsed. No
    /// counter adjustment: `active_<tier>` was already decremented at burn
    /// time (§9 "TTL vs counter drift" — counters track ACTIVE membership
    /// only, grace expiry is pure cleanup).
    pub fn delete_burned(&self, key_id: &str) -> Result<(), CoinError> {
        self.entries
            .remove(key_id.as_bytes())
            .map_err(|e| storage_err("sweep_burn_grace", e))?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), CoinError> {
        self._db.flush().map_err(|e| storage_err("flush", e))?;
        Ok(())
    }
}
