use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoinError;

/// Coarse classification of a one-time coin. Ordered GOLD > SILVER > BRONZE;
/// the ordering matters only for human-facing display, never for fallback
/// (fallback is looked up from the explicit table in [`crate::budget`]).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Gold, Tier::Silver, Tier::Bronze];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Gold => "GOLD",
            Tier::Silver => "SILVER",
            Tier::Bronze => "BRONZE",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoinError> {
        match s {
            "GOLD" => Ok(Tier::Gold),
            "SILVER" => Ok(Tier::Silver),
            "BRONZE" => Ok(Tier::Bronze),
            other => Err(CoinError::InvalidCoinCategory(other.to_string())),
        }
    }

    /// Approximate public-key + signature size in bytes (§6 `COIN_SIZE_BYTES`).
    pub fn size_bytes(&self) -> u64 {
        match self {
            Tier::Gold => 3_604,
            Tier::Silver => 1_248,
            Tier::Bronze => 96,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier::{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_gold_highest() {
        assert!(Tier::Gold > Tier::Silver);
        assert!(Tier::Silver > Tier::Bronze);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(matches!(
            Tier::parse("PLATINUM"),
            Err(CoinError::InvalidCoinCategory(_))
        ));
    }

    #[test]
    fn parse_round_trips_display() {
        for t in Tier::ALL {
            assert_eq!(Tier::parse(&t.to_string()).unwrap(), t);
        }
    }
}
