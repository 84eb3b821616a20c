use coin_core::{caps_for, CoinError, Priority, Tier};

use crate::store::SledInventoryStore;

/// Priority-downgrade trim (§4.2): for each tier, evict the newest entries
/// in excess of the new (lower) cap. Newest-first eviction is the explicit
/// policy choice documented in spec §8 — it preserves the FIFO-by-age
/// guarantee for the surviving keys, one of the few backward pops in the
/// design.
pub fn trim_excess(
    store: &SledInventoryStore,
    contact_id: &str,
    new_priority: Priority,
) -> Result<u64, CoinError> {
    let caps = caps_for(new_priority);
    let mut evicted = 0u64;
    for tier in Tier::ALL {
        let cap = caps.for_tier(tier) as usize;
        let count = store.count_index(contact_id, tier)?;
        if count <= cap {
            continue;
        }
        let excess = count - cap;
        evicted += store.pop_newest_n(contact_id, tier, excess)? as u64;
    }
    Ok(evicted)
}
