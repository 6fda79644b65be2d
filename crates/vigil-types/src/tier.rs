//! Model tiers and cost classes.
//!
//! A [`Tier`] names a quality/cost band for LLM calls; the router walks
//! tiers from the requested one downward when providers fail or budget
//! runs short. [`CostClass`] tags individual tier candidates so free
//! models can be preferred when paid budget is tight.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A model quality tier, strongest first.
///
/// `Level1` is the most capable (and most expensive) band; `LocalOnly`
/// means only zero-cost local or free-tier models may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Level1,
    Level2,
    Level3,
    LocalOnly,
}

impl Tier {
    /// All tiers in walk order, strongest first.
    pub const ORDER: [Tier; 4] = [Tier::Level1, Tier::Level2, Tier::Level3, Tier::LocalOnly];

    /// Position in the walk order: 0 for `Level1`, 3 for `LocalOnly`.
    pub fn rank(self) -> usize {
        match self {
            Tier::Level1 => 0,
            Tier::Level2 => 1,
            Tier::Level3 => 2,
            Tier::LocalOnly => 3,
        }
    }

    /// `true` if `self` is a weaker tier than `other` (higher rank).
    pub fn is_below(self, other: Tier) -> bool {
        self.rank() > other.rank()
    }

    /// Tiers from `self` downward, in walk order.
    pub fn walk(self) -> impl Iterator<Item = Tier> {
        Self::ORDER.into_iter().skip(self.rank())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Level1 => "level1",
            Tier::Level2 => "level2",
            Tier::Level3 => "level3",
            Tier::LocalOnly => "local_only",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "level1" => Ok(Tier::Level1),
            "level2" => Ok(Tier::Level2),
            "level3" => Ok(Tier::Level3),
            "local_only" => Ok(Tier::LocalOnly),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Cost class of a single tier candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    High,
    Medium,
    Low,
    Free,
}

impl CostClass {
    /// `true` for candidates that cost nothing per call.
    pub fn is_free(self) -> bool {
        matches!(self, CostClass::Free)
    }
}
