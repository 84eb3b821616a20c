//! coin-node — the coin lifecycle service binary.
//!
//! Startup sequence:
//!   1. Open the owner-local Secure Vault and Smart Inventory (sled)
//!   2. Open the Coin Inventory Server's Postgres pool and run migrations
//!   3. Spawn the maintenance scheduler (vault TTL/grace, inventory GC,
//!      server stale/fetched-grace purges)
//!   4. Serve the Coin Inventory Server's REST surface over HTTP

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use coin_api::{router, ApiState};
use coin_inventory::SmartInventory;
use coin_maintenance::{spawn_vault_sweeper, InventoryGc};
use coin_server::{open_pool, CoinInventoryServer};
use coin_vault::SecureVault;

use config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,coin=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("coin-node starting");

    // ── Owner-local stores ────────────────────────────────────────────────
    std::fs::create_dir_all(&args.vault_dir)
        .with_context(|| format!("creating vault dir {}", args.vault_dir.display()))?;
    std::fs::create_dir_all(&args.inventory_dir)
        .with_context(|| format!("creating inventory dir {}", args.inventory_dir.display()))?;

    let vault = Arc::new(SecureVault::open(&args.vault_dir).context("opening Secure Vault")?);
    let inventory =
        Arc::new(SmartInventory::open(&args.inventory_dir).context("opening Smart Inventory")?);

    // ── Coin Inventory Server ────────────────────────────────────────────
    let pg_pool = open_pool(&args.server_dsn, args.pool_min_size, args.pool_max_size)
        .await
        .context("opening Coin Inventory Server pool")?;
    let server = Arc::new(CoinInventoryServer::new(pg_pool));

    // ── Maintenance scheduler ────────────────────────────────────────────
    let _vault_sweeper = spawn_vault_sweeper(
        Arc::clone(&vault),
        Duration::from_secs(args.maintenance_interval_secs),
        coin_core::constants::VAULT_KEY_TTL_DAYS,
    );
    spawn_inventory_gc(
        Arc::clone(&inventory),
        Duration::from_secs(args.maintenance_interval_secs),
        args.gc_inactive_days,
    );
    spawn_server_maintenance(
        Arc::clone(&server),
        Duration::from_secs(args.maintenance_interval_secs),
        args.server_purge_max_age_days,
        args.server_hard_delete_grace_hours,
    );

    // ── HTTP surface (spec §6) ────────────────────────────────────────────
    let app = router(ApiState {
        server: Arc::clone(&server),
    });
    let listener = tokio::net::TcpListener::bind(args.http_addr)
        .await
        .with_context(|| format!("binding {}", args.http_addr))?;
    info!(addr = %args.http_addr, "coin-node ready");
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated")?;

    Ok(())
}

/// Periodic inventory GC (§4.5). The inventory's operations are synchronous
/// (§5 "Scheduling model"), so the sweep runs inside `spawn_blocking`.
fn spawn_inventory_gc(
    inventory: Arc<SmartInventory>,
    interval: Duration,
    inactive_days: u32,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let inventory = Arc::clone(&inventory);
            let result =
                tokio::task::spawn_blocking(move || InventoryGc::new(&inventory).garbage_collect(inactive_days))
                    .await;
            match result {
                Ok(Ok(gc)) if gc.contacts_cleaned > 0 => {
                    info!(
                        contacts_cleaned = gc.contacts_cleaned,
                        keys_deleted = gc.keys_deleted,
                        bytes_freed = gc.bytes_freed,
                        "inventory GC swept inactive contacts"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "inventory GC failed"),
                Err(e) => warn!(error = %e, "inventory GC task panicked"),
            }
        }
    })
}

/// Periodic server maintenance (§4.3): stale-unclaimed purge and
/// fetched-grace hard delete.
fn spawn_server_maintenance(
    server: Arc<CoinInventoryServer>,
    interval: Duration,
    purge_max_age_days: u32,
    hard_delete_grace_hours: u32,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match server.purge_stale(purge_max_age_days).await {
                Ok(n) if n > 0 => info!(deleted = n, "purged stale unclaimed server coins"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "purge_stale failed"),
            }
            match server.hard_delete_fetched(hard_delete_grace_hours).await {
                Ok(n) if n > 0 => info!(deleted = n, "hard-deleted fetched server coins past grace"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "hard_delete_fetched failed"),
            }
        }
    })
}
