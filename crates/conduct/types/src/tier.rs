use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reviewing roles of the approval ladder, lowest first.
///
/// `Student` authors the self assessment and owns no gate. Every other tier
/// owns one per-(class, term) gate that flips exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Student,
    Leader,
    Teacher,
    Faculty,
    Admin,
}

impl Tier {
    pub const LADDER: [Tier; 5] = [
        Tier::Student,
        Tier::Leader,
        Tier::Teacher,
        Tier::Faculty,
        Tier::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Leader => "leader",
            Self::Teacher => "teacher",
            Self::Faculty => "faculty",
            Self::Admin => "admin",
        }
    }

    /// Whether this tier owns an approval gate.
    pub fn is_gated(self) -> bool {
        !matches!(self, Self::Student)
    }

    /// The tier directly below this one.
    pub fn below(self) -> Option<Tier> {
        match self {
            Self::Student => None,
            Self::Leader => Some(Self::Student),
            Self::Teacher => Some(Self::Leader),
            Self::Faculty => Some(Self::Teacher),
            Self::Admin => Some(Self::Faculty),
        }
    }

    /// Tiers below this one, nearest first.
    pub fn subordinates(self) -> impl Iterator<Item = Tier> {
        std::iter::successors(self.below(), |tier| tier.below())
    }

    /// The tier directly above this one.
    pub fn above(self) -> Option<Tier> {
        match self {
            Self::Student => Some(Self::Leader),
            Self::Leader => Some(Self::Teacher),
            Self::Teacher => Some(Self::Faculty),
            Self::Faculty => Some(Self::Admin),
            Self::Admin => None,
        }
    }

    /// Tiers above this one, nearest first.
    pub fn superiors(self) -> impl Iterator<Item = Tier> {
        std::iter::successors(self.above(), |tier| tier.above())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tier `{0}`")]
pub struct ParseTierError(pub String);

impl FromStr for Tier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::LADDER
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseTierError(s.to_string()))
    }
}
