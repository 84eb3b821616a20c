use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use coin_core::CoinError;
use coin_server::CoinInventoryServer;
use tower_http::cors::CorsLayer;

use crate::dto::{
    CountQuery, CountResponse, DeleteResponse, FetchQuery, FetchResponse, HardDeleteRequest,
    HealthResponse, PurgeRequest, UploadRequest, UploadResponse,
};

/// REST surface for the Coin Inventory Server (spec §6). Thin external
/// collaborator over `coin-server`: every handler decodes/encodes base64
/// at the edge and otherwise delegates straight through.
///
/// Grounded on `original_source/AQM_Database/aqm_server/api.py`'s route
/// table, translated to axum the way
/// `examples/lambdaclass-ethrex/crates/l2/sequencer/admin_server.rs` wires
/// a `Router` + `tower_http::cors::CorsLayer` + `IntoResponse` error
/// mapping over shared `State`, since `chronx-node` serves JSON-RPC 2.0
/// rather than REST.
#[derive(Clone)]
pub struct ApiState {
    pub server: Arc<CoinInventoryServer>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/coins/upload", post(upload_coins))
        .route("/v1/coins/fetch", get(fetch_coins))
        .route("/v1/coins/count", get(get_count))
        .route("/v1/admin/purge-stale", post(purge_stale))
        .route("/v1/admin/hard-delete", post(hard_delete))
        .route("/v1/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Maps `CoinError` onto the status codes §6's endpoint table specifies:
/// 422 for invalid category/params, 500 for backing-store failures.
struct ApiError(CoinError);

impl From<CoinError> for ApiError {
    fn from(e: CoinError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn upload_coins(
    State(state): State<ApiState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut coins = Vec::with_capacity(req.coins.len());
    for item in req.coins {
        coins.push(item.into_domain()?);
    }
    let inserted = state.server.upload_coins(req.user_id, &coins).await?;
    Ok(Json(UploadResponse { inserted }))
}

async fn fetch_coins(
    State(state): State<ApiState>,
    Query(q): Query<FetchQuery>,
) -> Result<Json<FetchResponse>, ApiError> {
    if q.count <= 0 {
        return Err(ApiError(CoinError::InvalidCoinCategory(
            "count must be > 0".to_string(),
        )));
    }
    let records = state
        .server
        .fetch_coins(q.target_user_id, q.requester_id, &q.coin_category, q.count)
        .await?;
    Ok(Json(FetchResponse {
        coins: records.into_iter().map(Into::into).collect(),
    }))
}

async fn get_count(
    State(state): State<ApiState>,
    Query(q): Query<CountQuery>,
) -> Result<Json<CountResponse>, ApiError> {
    let c = state.server.get_inventory_count(q.user_id).await?;
    Ok(Json(CountResponse {
        gold: c.gold,
        silver: c.silver,
        bronze: c.bronze,
    }))
}

async fn purge_stale(
    State(state): State<ApiState>,
    Json(req): Json<PurgeRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.server.purge_stale(req.max_age_days).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn hard_delete(
    State(state): State<ApiState>,
    Json(req): Json<HardDeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.server.hard_delete_fetched(req.grace_hours).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let connected = coin_server::health_check(state.server.pool()).await;
    Json(HealthResponse {
        status: if connected { "ok" } else { "degraded" },
        db_connected: connected,
    })
}
