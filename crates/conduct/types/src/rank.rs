use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete conduct classification derived from a term total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Rank {
    Kem,
    Yeu,
    TrungBinh,
    Kha,
    Tot,
    XuatSac,
}

impl Rank {
    /// Bracket a total into its rank. Every write site goes through here.
    pub fn for_total(total: i32) -> Self {
        match total {
            t if t >= 90 => Self::XuatSac,
            t if t >= 80 => Self::Tot,
            t if t >= 65 => Self::Kha,
            t if t >= 50 => Self::TrungBinh,
            t if t >= 35 => Self::Yeu,
            _ => Self::Kem,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::XuatSac => "Xuất sắc",
            Self::Tot => "Tốt",
            Self::Kha => "Khá",
            Self::TrungBinh => "Trung bình",
            Self::Yeu => "Yếu",
            Self::Kem => "Kém",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::XuatSac,
            Self::Tot,
            Self::Kha,
            Self::TrungBinh,
            Self::Yeu,
            Self::Kem,
        ]
        .into_iter()
        .find(|rank| rank.label() == s)
        .ok_or_else(|| format!("unknown rank label `{s}`"))
    }
}

impl TryFrom<String> for Rank {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.label().to_string()
    }
}
