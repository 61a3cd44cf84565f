//! Lifecycle partitions
//!
//! Each partition is one sheet of the workbook.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The durable bucket a proposal lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    /// Votes with a pending deadline
    InProgress,
    /// Votes that passed
    Approved,
    /// Votes that failed after exhausting renewals
    Denied,
}

impl Partition {
    /// Read order used when listing the workbook
    pub const ALL: [Partition; 3] = [Partition::Approved, Partition::InProgress, Partition::Denied];

    /// Scan order used when locating a row for removal (first match wins)
    pub const REMOVAL_ORDER: [Partition; 3] = [Partition::Approved, Partition::Denied, Partition::InProgress];

    /// Sheet (tab) name in the workbook
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Self::InProgress => "In Progress",
            Self::Approved => "Approved",
            Self::Denied => "Denied/Postponed",
        }
    }

    /// All sheet names, in read order
    pub fn sheet_names() -> [&'static str; 3] {
        Self::ALL.map(|p| p.sheet_name())
    }

    /// Reverse of [`Partition::sheet_name`]
    pub fn from_sheet_name(name: &str) -> Option<Self> {
        debug!(%name, "Partition::from_sheet_name: called");
        Self::ALL.into_iter().find(|p| p.sheet_name() == name)
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sheet_name())
    }
}

impl std::str::FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "in-progress" | "inprogress" | "pending" => Ok(Self::InProgress),
            "approved" | "passed" => Ok(Self::Approved),
            "denied" | "denied/postponed" | "failed" => Ok(Self::Denied),
            _ => Err(format!(
                "Unknown partition: {}. Use: in-progress, approved, or denied",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_names_round_trip() {
        for partition in Partition::ALL {
            assert_eq!(Partition::from_sheet_name(partition.sheet_name()), Some(partition));
        }
        assert_eq!(Partition::from_sheet_name("Archive"), None);
    }

    #[test]
    fn test_removal_order_covers_every_partition() {
        let mut order = Partition::REMOVAL_ORDER.to_vec();
        order.sort_by_key(|p| p.sheet_name());
        let mut all = Partition::ALL.to_vec();
        all.sort_by_key(|p| p.sheet_name());
        assert_eq!(order, all);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("in-progress".parse::<Partition>(), Ok(Partition::InProgress));
        assert_eq!("In Progress".parse::<Partition>(), Ok(Partition::InProgress));
        assert_eq!("approved".parse::<Partition>(), Ok(Partition::Approved));
        assert_eq!("Denied/Postponed".parse::<Partition>(), Ok(Partition::Denied));
        assert!("archived".parse::<Partition>().is_err());
    }
}
