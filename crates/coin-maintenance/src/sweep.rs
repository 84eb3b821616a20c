use std::sync::Arc;
use std::time::Duration;

use coin_vault::SecureVault;
use tracing::{info, warn};

/// Scheduled reconciliation for the vault's two passive-expiry rules
/// (§9 "TTL vs counter drift" — the decision to schedule `purge_expired`
/// rather than switch to on-read counting). Runs `purge_expired` and
/// `sweep_burn_grace` on a fixed interval for the lifetime of the process.
///
/// Grounded on `chronx-node`'s pattern of spawning long-lived background
/// tasks from `main` via `tokio::spawn`.
pub fn spawn_vault_sweeper(
    vault: Arc<SecureVault>,
    interval: Duration,
    max_age_days: u32,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let vault = Arc::clone(&vault);
            let swept = tokio::task::spawn_blocking(move || {
                let expired = vault.purge_expired(max_age_days);
                let grace = vault.sweep_burn_grace();
                (expired, grace)
            })
            .await;

            match swept {
                Ok((Ok(expired), Ok(grace))) => {
                    if expired > 0 || grace > 0 {
                        info!(expired, grace, "vault sweep reconciled counters");
                    }
                }
                Ok((Err(e), _)) | Ok((_, Err(e))) => {
                    warn!(error = %e, "vault sweep failed");
                }
                Err(e) => {
                    warn!(error = %e, "vault sweep task panicked");
                }
            }
        }
    })
}
