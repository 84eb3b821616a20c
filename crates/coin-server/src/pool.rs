use std::time::Duration;

use coin_core::CoinError;
use sqlx::postgres::{PgPoolOptions, PgSslMode};
use sqlx::PgPool;

/// Open (and migrate) the Postgres connection pool backing the Coin
/// Inventory Server.
pub async fn open_pool(dsn: &str, min_size: u32, max_size: u32) -> Result<PgPool, CoinError> {
    let pool = PgPoolOptions::new()
        .min_connections(min_size)
        .max_connections(max_size)
        .acquire_timeout(Duration::from_secs(10))
        .connect(dsn)
        .await
        .map_err(|e| CoinError::ConnectionPoolError(e.to_string()))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| CoinError::ConnectionPoolError(format!("migration failed: {e}")))?;

    Ok(pool)
}

/// Variant accepting an explicit SSL mode, for deployments behind a
/// connection proxy that terminates TLS itself.
pub async fn open_pool_with_ssl(
    dsn: &str,
    min_size: u32,
    max_size: u32,
    ssl_mode: PgSslMode,
) -> Result<PgPool, CoinError> {
    let mut opts: sqlx::postgres::PgConnectOptions = dsn
        .parse()
        .map_err(|e: sqlx::Error| CoinError::ConnectionPoolError(e.to_string()))?;
    opts = opts.ssl_mode(ssl_mode);

    let pool = PgPoolOptions::new()
        .min_connections(min_size)
        .max_connections(max_size)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(opts)
        .await
        .map_err(|e| CoinError::ConnectionPoolError(e.to_string()))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| CoinError::ConnectionPoolError(format!("migration failed: {e}")))?;

    Ok(pool)
}

/// `SELECT 1` liveness probe, for the `/v1/health` endpoint.
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|v| v == 1)
        .unwrap_or(false)
}
