use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use coin_core::{CoinError, CoinRecord, CoinUpload, Tier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HTTP DTOs for §6's REST surface. Binary blobs are base64-encoded over
/// the wire; this module is the only place that knows about that encoding —
/// everything past [`CoinUploadItem::into_domain`] deals in raw bytes.
///
/// Grounded field-for-field on `original_source/AQM_Database/aqm_server/api.py`'s
/// pydantic models.
#[derive(Debug, Deserialize)]
pub struct CoinUploadItem {
    pub key_id: String,
    pub coin_category: String,
    pub public_key_b64: String,
    pub signature_b64: String,
}

impl CoinUploadItem {
    pub fn into_domain(self) -> Result<CoinUpload, CoinError> {
        Ok(CoinUpload {
            key_id: self.key_id,
            coin_category: Tier::parse(&self.coin_category)?,
            public_key_blob: B64
                .decode(&self.public_key_b64)
                .map_err(|e| CoinError::InvalidCoinCategory(format!("bad base64: {e}")))?,
            signature_blob: B64
                .decode(&self.signature_b64)
                .map_err(|e| CoinError::InvalidCoinCategory(format!("bad base64: {e}")))?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub user_id: Uuid,
    pub coins: Vec<CoinUploadItem>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub inserted: u64,
}

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub target_user_id: Uuid,
    pub requester_id: Uuid,
    pub coin_category: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct CoinOut {
    pub key_id: String,
    pub coin_category: String,
    pub public_key_b64: String,
    pub signature_b64: String,
}

impl From<CoinRecord> for CoinOut {
    fn from(r: CoinRecord) -> Self {
        Self {
            key_id: r.key_id,
            coin_category: r.coin_category.to_string(),
            public_key_b64: B64.encode(r.public_key_blob),
            signature_b64: B64.encode(r.signature_blob),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub coins: Vec<CoinOut>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
}

fn default_max_age_days() -> u32 {
    coin_core::constants::SERVER_PURGE_STALE_MAX_AGE_DAYS
}

fn default_grace_hours() -> u32 {
    coin_core::constants::SERVER_HARD_DELETE_GRACE_HOURS
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

#[derive(Debug, Deserialize)]
pub struct HardDeleteRequest {
    #[serde(default = "default_grace_hours")]
    pub grace_hours: u32,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_connected: bool,
}
