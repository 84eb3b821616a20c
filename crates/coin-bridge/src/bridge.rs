use std::collections::HashMap;
use std::sync::Arc;

use coin_core::{CoinError, CoinRecord, CoinUpload, Tier};
use coin_inventory::SmartInventory;
use coin_server::CoinInventoryServer;
use uuid::Uuid;

/// Composes fetch-from-server and store-to-inventory under the inventory's
/// budget (§4.4). The hard invariant this crate exists for: "no peer ever
/// exceeds its cap, even under concurrent fetches."
///
/// Grounded on `original_source/AQM_Database/bridge.py` line-for-line logic.
/// The vault/inventory calls are synchronous (§5 "Scheduling model" — they
/// are invoked from parallel worker threads, not task-suspend points), so
/// every inventory call here runs inside `tokio::task::spawn_blocking`: the
/// bridge's own task, under the cooperative single-threaded scheduler, must
/// not block on them directly.
pub struct Bridge {
    server: Arc<CoinInventoryServer>,
    inventory: Arc<SmartInventory>,
}

impl Bridge {
    pub fn new(server: Arc<CoinInventoryServer>, inventory: Arc<SmartInventory>) -> Self {
        Self { server, inventory }
    }

    /// Claim up to `count` coins from the server, then attempt to cache each
    /// in order. Stops immediately on the first `BudgetExceeded` — no
    /// further stores are attempted, and already-claimed-but-uncached server
    /// coins are lost (§9 Open Question "Bridge over-claim", preserved as
    /// specified, not fixed here).
    pub async fn fetch_and_cache(
        &self,
        contact_id: &str,
        target_user_id: Uuid,
        requester_id: Uuid,
        coin_category: &str,
        count: i64,
    ) -> Result<Vec<CoinRecord>, CoinError> {
        let coins = self
            .server
            .fetch_coins(target_user_id, requester_id, coin_category, count)
            .await?;

        let mut cached = Vec::new();
        for coin in coins {
            let store_result = self.store_one(contact_id, &coin).await?;
            match store_result {
                Ok(()) => cached.push(coin),
                Err(CoinError::BudgetExceeded { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(cached)
    }

    async fn store_one(
        &self,
        contact_id: &str,
        coin: &CoinRecord,
    ) -> Result<Result<(), CoinError>, CoinError> {
        let inventory = Arc::clone(&self.inventory);
        let contact_id = contact_id.to_string();
        let key_id = coin.key_id.clone();
        let tier = coin.coin_category.to_string();
        let public_key = coin.public_key_blob.clone();
        let signature = coin.signature_blob.clone();

        let joined = tokio::task::spawn_blocking(move || {
            inventory.store_key(&contact_id, &key_id, &tier, public_key, signature)
        })
        .await
        .map_err(|e| CoinError::InventoryUnavailable(format!("store_key join error: {e}")))?;

        Ok(joined)
    }

    /// Pure pass-through to the server.
    pub async fn upload_coins(
        &self,
        user_id: Uuid,
        coins: &[CoinUpload],
    ) -> Result<u64, CoinError> {
        self.server.upload_coins(user_id, coins).await
    }

    /// Top up local inventory for a contact to their priority's budget caps,
    /// fetching exactly the per-tier deficit (§4.4).
    pub async fn sync_inventory(
        &self,
        contact_id: &str,
        target_user_id: Uuid,
        requester_id: Uuid,
    ) -> Result<HashMap<Tier, u32>, CoinError> {
        let inventory = Arc::clone(&self.inventory);
        let cid = contact_id.to_string();
        let meta_and_summary = tokio::task::spawn_blocking(move || {
            let meta = inventory.get_contact_meta(&cid)?;
            match meta {
                Some(_) => Ok(Some(inventory.get_inventory(&cid)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CoinError::InventoryUnavailable(format!("sync_inventory join error: {e}")))??;

        let Some(summary) = meta_and_summary else {
            let mut zero = HashMap::new();
            for tier in Tier::ALL {
                zero.insert(tier, 0);
            }
            return Ok(zero);
        };

        let caps = coin_core::caps_for(summary.priority);
        let mut fetched_counts = HashMap::new();
        for tier in Tier::ALL {
            let current = summary.count_for(tier);
            let cap = caps.for_tier(tier);
            let deficit = cap.saturating_sub(current);
            if deficit == 0 {
                fetched_counts.insert(tier, 0);
                continue;
            }
            let cached = self
                .fetch_and_cache(
                    contact_id,
                    target_user_id,
                    requester_id,
                    tier.as_str(),
                    deficit as i64,
                )
                .await?;
            fetched_counts.insert(tier, cached.len() as u32);
        }
        Ok(fetched_counts)
    }
}
