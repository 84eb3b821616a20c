use serde::{Deserialize, Serialize};

/// Per-entry vault state. Monotone `Active -> Burned`; never the reverse
/// (§4.1 "State machine").
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub enum CoinStatus {
    Active,
    Burned,
}

impl CoinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoinStatus::Active => "ACTIVE",
            CoinStatus::Burned => "BURNED",
        }
    }
}
