//! Proposal kinds: developments and community proposals

use serde::{Deserialize, Serialize};

use super::DevType;

/// Kind of community proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityType {
    Player,
    Rule,
    Misc,
}

impl CommunityType {
    pub const ALL: [CommunityType; 3] = [CommunityType::Player, CommunityType::Rule, CommunityType::Misc];

    /// Label shown in the vote announcement and stored in the `type` column
    pub fn display_value(&self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Rule => "Rule",
            Self::Misc => "Misc",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Rule => "rule",
            Self::Misc => "misc",
        }
    }
}

impl std::fmt::Display for CommunityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CommunityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("Unknown community proposal type: {}. Use: player, rule, or misc", s))
    }
}

/// What a vote is about, which sets its base duration and announcement wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalKind {
    Development(DevType),
    Community(CommunityType),
}

impl ProposalKind {
    /// Base vote duration in hours
    pub fn base_hours(&self) -> f64 {
        match self {
            Self::Development(t) => t.base_hours(),
            Self::Community(_) => 24.0,
        }
    }

    /// Base vote duration in milliseconds
    pub fn base_ms(&self) -> i64 {
        (self.base_hours() * 3_600_000.0).round() as i64
    }

    /// Label stored in the `type` column
    pub fn display_value(&self) -> &'static str {
        match self {
            Self::Development(t) => t.display_value(),
            Self::Community(t) => t.display_value(),
        }
    }

    /// Announcement heading
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Development(_) => "Development Vote",
            Self::Community(_) => "Community Vote",
        }
    }

    /// Announcement label for the first deadline
    pub fn deadline_label(&self) -> &'static str {
        match self {
            Self::Development(_) => "First Deadline",
            Self::Community(_) => "Deadline",
        }
    }

    /// What the objection reaction objects to
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Development(_) => "development",
            Self::Community(_) => "proposal",
        }
    }
}

impl From<DevType> for ProposalKind {
    fn from(t: DevType) -> Self {
        Self::Development(t)
    }
}

impl From<CommunityType> for ProposalKind {
    fn from(t: CommunityType) -> Self {
        Self::Community(t)
    }
}

impl std::fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development(t) => write!(f, "{}", t),
            Self::Community(t) => write!(f, "community:{}", t),
        }
    }
}
