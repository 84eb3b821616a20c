//! Scenario E (§8): sync top-up against a live server + local inventory.
//! Requires a live Postgres reachable via `DATABASE_URL`; `#[sqlx::test]`
//! provisions a fresh database per test and applies `coin-server`'s
//! migrations directly (pointed at by relative path) rather than going
//! through `coin_server::open_pool`, so each test gets an isolated schema.

use std::sync::Arc;

use coin_bridge::Bridge;
use coin_core::{CoinUpload, Tier};
use coin_inventory::SmartInventory;
use coin_server::CoinInventoryServer;
use sqlx::PgPool;
use uuid::Uuid;
use tempfile::tempdir;

fn coin(key_id: &str, tier: Tier) -> CoinUpload {
    CoinUpload {
        key_id: key_id.to_string(),
        coin_category: tier,
        public_key_blob: vec![1],
        signature_blob: vec![2],
    }
}

#[sqlx::test(migrations = "../coin-server/migrations")]
async fn sync_inventory_tops_up_to_caps_scenario_e(pool: PgPool) {
    let dir = tempdir().unwrap();
    let inventory = Arc::new(SmartInventory::open(dir.path()).unwrap());
    let server = Arc::new(CoinInventoryServer::new(pool));
    let bridge = Bridge::new(Arc::clone(&server), Arc::clone(&inventory));

    let target = Uuid::new_v4();
    let requester = Uuid::new_v4();

    inventory.register_contact("bob", "BESTIE", None).unwrap();
    inventory
        .store_key("bob", "pre1", "GOLD", vec![], vec![])
        .unwrap();
    inventory
        .store_key("bob", "pre2", "GOLD", vec![], vec![])
        .unwrap();

    let mut coins = Vec::new();
    for i in 0..10 {
        coins.push(coin(&format!("g{i}"), Tier::Gold));
        coins.push(coin(&format!("s{i}"), Tier::Silver));
        coins.push(coin(&format!("b{i}"), Tier::Bronze));
    }
    server.upload_coins(target, &coins).await.unwrap();

    let fetched = bridge
        .sync_inventory("bob", target, requester)
        .await
        .unwrap();

    assert_eq!(fetched[&Tier::Gold], 3);
    assert_eq!(fetched[&Tier::Silver], 4);
    assert_eq!(fetched[&Tier::Bronze], 1);

    let summary = inventory.get_inventory("bob").unwrap();
    assert_eq!(summary.gold_count, 5);
    assert_eq!(summary.silver_count, 4);
    assert_eq!(summary.bronze_count, 1);

    let remaining = server.get_inventory_count(target).await.unwrap();
    assert_eq!(remaining.gold, 10 - 3);
    assert_eq!(remaining.silver, 10 - 4);
    assert_eq!(remaining.bronze, 10 - 1);
}

#[sqlx::test(migrations = "../coin-server/migrations")]
async fn sync_inventory_unregistered_contact_returns_zeros(pool: PgPool) {
    let dir = tempdir().unwrap();
    let inventory = Arc::new(SmartInventory::open(dir.path()).unwrap());
    let server = Arc::new(CoinInventoryServer::new(pool));
    let bridge = Bridge::new(Arc::clone(&server), Arc::clone(&inventory));

    let fetched = bridge
        .sync_inventory("ghost", Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    for tier in Tier::ALL {
        assert_eq!(fetched[&tier], 0);
    }
}
