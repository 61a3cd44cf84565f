//! Development types and their vote lengths

use serde::{Deserialize, Serialize};

/// Kind of development being proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevType {
    Town,
    Rail,
    Misc,
    Airport,
    Road,
}

impl DevType {
    pub const ALL: [DevType; 5] = [
        DevType::Airport,
        DevType::Misc,
        DevType::Rail,
        DevType::Town,
        DevType::Road,
    ];

    /// Base vote duration in hours (first deadline, and the basis for extensions)
    pub fn base_hours(&self) -> f64 {
        match self {
            Self::Airport => 72.0,
            Self::Town | Self::Rail | Self::Misc | Self::Road => 24.0,
        }
    }

    /// Label shown in the vote announcement and stored in the `type` column
    pub fn display_value(&self) -> &'static str {
        match self {
            Self::Airport => "Airport ✈️",
            Self::Misc => "Miscellaneous",
            Self::Rail => "Rail 🚆",
            Self::Town => "Town 🏘",
            Self::Road => "Road 🛣️",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Town => "town",
            Self::Rail => "rail",
            Self::Misc => "misc",
            Self::Airport => "airport",
            Self::Road => "road",
        }
    }
}

impl std::fmt::Display for DevType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DevType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("Unknown development type: {}. Use: town, rail, road, airport, or misc", s))
    }
}
