use chrono::{Duration as ChronoDuration, Utc};
use coin_core::{CoinError, CoinRecord, CoinUpload, InventoryCount, Tier};
use sqlx::PgPool;
use uuid::Uuid;

/// Shared public-coin pool, dispensed atomically under concurrent demand
/// (§4.3). Backed by Postgres so `fetch_coins` can lean on `SELECT ... FOR
/// UPDATE SKIP LOCKED`, which sled cannot express — the reason this
/// component alone breaks from the vault/inventory's sled-backed storage
/// (DESIGN.md).
pub struct CoinInventoryServer {
    pool: PgPool,
}

impl CoinInventoryServer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers (e.g. the HTTP health endpoint)
    /// that need a raw liveness probe outside the server's own operations.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert each `(user_id, key_id)` as a new row; duplicates silently
    /// skipped. The whole batch runs in one transaction — partial commit is
    /// not observable. Returns the count actually inserted.
    pub async fn upload_coins(
        &self,
        user_id: Uuid,
        coins: &[CoinUpload],
    ) -> Result<u64, CoinError> {
        if coins.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoinError::UploadError(e.to_string()))?;

        let mut inserted = 0u64;
        for coin in coins {
            let result = sqlx::query(
                r#"
                INSERT INTO coin_inventory (user_id, key_id, coin_category, public_key_blob, signature_blob)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, key_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(&coin.key_id)
            .bind(coin.coin_category.as_str())
            .bind(&coin.public_key_blob)
            .bind(&coin.signature_blob)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoinError::UploadError(e.to_string()))?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| CoinError::UploadError(e.to_string()))?;
        Ok(inserted)
    }

    /// Atomically claim up to `count` unclaimed rows for `(target_user_id,
    /// coin_category)`, FIFO by `uploaded_at`, marking each with
    /// `fetched_by`/`fetched_at`. `SELECT ... FOR UPDATE SKIP LOCKED` gives
    /// disjoint claims across concurrent callers without blocking on rows
    /// they aren't claiming (§4.3 "Atomic claim algorithm").
    pub async fn fetch_coins(
        &self,
        target_user_id: Uuid,
        requester_id: Uuid,
        coin_category: &str,
        count: i64,
    ) -> Result<Vec<CoinRecord>, CoinError> {
        let tier = Tier::parse(coin_category)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoinError::FetchError(e.to_string()))?;

        let rows: Vec<(String, Vec<u8>, Vec<u8>)> = sqlx::query_as(
            r#"
            WITH claimed AS (
                SELECT record_id, key_id, public_key_blob, signature_blob
                FROM coin_inventory
                WHERE user_id = $1 AND coin_category = $2 AND fetched_by IS NULL
                ORDER BY uploaded_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE coin_inventory ci
            SET fetched_by = $4, fetched_at = NOW()
            FROM claimed
            WHERE ci.record_id = claimed.record_id
            RETURNING claimed.key_id, claimed.public_key_blob, claimed.signature_blob
            "#,
        )
        .bind(target_user_id)
        .bind(tier.as_str())
        .bind(count)
        .bind(requester_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| CoinError::FetchError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CoinError::FetchError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(key_id, public_key_blob, signature_blob)| CoinRecord {
                key_id,
                coin_category: tier,
                public_key_blob,
                signature_blob,
            })
            .collect())
    }

    /// Unfetched counts per tier for `user_id`.
    pub async fn get_inventory_count(&self, user_id: Uuid) -> Result<InventoryCount, CoinError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT coin_category, COUNT(*) as cnt
            FROM coin_inventory
            WHERE user_id = $1 AND fetched_by IS NULL
            GROUP BY coin_category
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoinError::ServerDatabaseError("get_inventory_count".to_string(), e.to_string()))?;

        let mut counts = InventoryCount::default();
        for (category, cnt) in rows {
            match category.as_str() {
                "GOLD" => counts.gold = cnt,
                "SILVER" => counts.silver = cnt,
                "BRONZE" => counts.bronze = cnt,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// Delete unclaimed rows older than `max_age_days`. Returns count.
    pub async fn purge_stale(&self, max_age_days: u32) -> Result<u64, CoinError> {
        let cutoff = Utc::now() - ChronoDuration::days(max_age_days as i64);
        let result = sqlx::query(
            "DELETE FROM coin_inventory WHERE uploaded_at < $1 AND fetched_by IS NULL",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| CoinError::ServerDatabaseError("purge_stale".to_string(), e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Delete claimed rows whose grace window has elapsed. Returns count.
    pub async fn hard_delete_fetched(&self, grace_hours: u32) -> Result<u64, CoinError> {
        let cutoff = Utc::now() - ChronoDuration::hours(grace_hours as i64);
        let result = sqlx::query(
            "DELETE FROM coin_inventory WHERE fetched_by IS NOT NULL AND fetched_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            CoinError::ServerDatabaseError("hard_delete_fetched".to_string(), e.to_string())
        })?;
        Ok(result.rows_affected())
    }
}
