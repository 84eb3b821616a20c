use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoinError;

/// Classification of a contact. Ranked `Bestie < Mate < Stranger` (lower
/// rank = higher trust) so BESTIE=0 < MATE=1 < STRANGER=2 is used to
/// detect priority downgrades.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Bestie,
    Mate,
    Stranger,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Bestie => "BESTIE",
            Priority::Mate => "MATE",
            Priority::Stranger => "STRANGER",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoinError> {
        match s {
            "BESTIE" => Ok(Priority::Bestie),
            "MATE" => Ok(Priority::Mate),
            "STRANGER" => Ok(Priority::Stranger),
            other => Err(CoinError::InvalidPriority(other.to_string())),
        }
    }

    /// `true` if `new` ranks strictly lower than `self` (a downgrade), the
    /// trigger condition for the priority-downgrade trim.
    pub fn is_downgrade_to(&self, new: Priority) -> bool {
        new > *self
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority::{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_order() {
        assert!(Priority::Bestie < Priority::Mate);
        assert!(Priority::Mate < Priority::Stranger);
    }

    #[test]
    fn downgrade_detection() {
        assert!(Priority::Bestie.is_downgrade_to(Priority::Mate));
        assert!(!Priority::Mate.is_downgrade_to(Priority::Bestie));
        assert!(!Priority::Mate.is_downgrade_to(Priority::Mate));
    }
}
