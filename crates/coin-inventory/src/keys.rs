//! Sled key encoding for the Smart Inventory's trees.
//!
//! Every key is length-prefixed on `contact_id` so that prefix scans over
//! `(contact_id, tier)` can never accidentally match a different contact
//! whose id happens to share a textual prefix (e.g. "bob" vs "bobby").

use coin_core::Tier;

fn tier_byte(tier: Tier) -> u8 {
    match tier {
        Tier::Gold => 0,
        Tier::Silver => 1,
        Tier::Bronze => 2,
    }
}

pub fn byte_tier(b: u8) -> Option<Tier> {
    match b {
        0 => Some(Tier::Gold),
        1 => Some(Tier::Silver),
        2 => Some(Tier::Bronze),
        _ => None,
    }
}

fn with_contact_prefix(contact_id: &str, rest: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + contact_id.len() + 16);
    out.extend_from_slice(&(contact_id.len() as u32).to_be_bytes());
    out.extend_from_slice(contact_id.as_bytes());
    rest(&mut out);
    out
}

/// `entries` tree key: `len(contact_id) || contact_id || key_id`.
pub fn entries_key(contact_id: &str, key_id: &str) -> Vec<u8> {
    with_contact_prefix(contact_id, |out| out.extend_from_slice(key_id.as_bytes()))
}

/// `index` tree key: `len(contact_id) || contact_id || tier || fetched_at_be || key_id`.
/// Sorted lexicographically, the `fetched_at_be` field sorts entries oldest-first.
pub fn index_key(contact_id: &str, tier: Tier, fetched_at: i64, key_id: &str) -> Vec<u8> {
    with_contact_prefix(contact_id, |out| {
        out.push(tier_byte(tier));
        out.extend_from_slice(&(fetched_at as u64).to_be_bytes());
        out.extend_from_slice(key_id.as_bytes());
    })
}

/// Prefix covering every `index` entry for `(contact_id, tier)`.
pub fn index_prefix(contact_id: &str, tier: Tier) -> Vec<u8> {
    with_contact_prefix(contact_id, |out| out.push(tier_byte(tier)))
}

/// Extract the `key_id` suffix from a full `index` key, given the contact/tier prefix length.
pub fn key_id_from_index_key(full_key: &[u8], prefix_len: usize) -> String {
    // prefix_len covers len-prefix + contact_id + tier byte; the fetched_at
    // field is the next 8 bytes, then the key_id.
    let key_id_start = prefix_len + 8;
    String::from_utf8_lossy(&full_key[key_id_start..]).into_owned()
}

/// `version` tree key: `len(contact_id) || contact_id || tier`. CAS counter
/// gating `store_key`'s optimistic transaction (§4.2).
pub fn version_key(contact_id: &str, tier: Tier) -> Vec<u8> {
    with_contact_prefix(contact_id, |out| out.push(tier_byte(tier)))
}

/// Prefix covering every `meta` key belonging to contacts (the `meta` tree
/// has no other key shape, so this is simply an empty prefix — kept for
/// symmetry/documentation with the other prefix scans).
pub fn meta_key(contact_id: &str) -> Vec<u8> {
    contact_id.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_contacts_dont_collide_as_prefixes() {
        let a = index_prefix("bob", Tier::Gold);
        let b = index_prefix("bobby", Tier::Gold);
        assert!(!b.starts_with(&a) || a.len() == b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn index_key_recovers_key_id() {
        let prefix = index_prefix("alice", Tier::Silver);
        let full = index_key("alice", Tier::Silver, 12345, "key-42");
        assert!(full.starts_with(&prefix));
        assert_eq!(key_id_from_index_key(&full, prefix.len()), "key-42");
    }

    #[test]
    fn index_keys_sort_oldest_first() {
        let k1 = index_key("c", Tier::Bronze, 100, "a");
        let k2 = index_key("c", Tier::Bronze, 200, "b");
        assert!(k1 < k2);
    }
}
