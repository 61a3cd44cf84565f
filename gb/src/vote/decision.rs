//! Pure vote decision rules
//!
//! Given the live objection count and the renewal history, decide what
//! happens at a deadline. No I/O.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Renewals allowed before a vote with outstanding objections fails
pub const DEFAULT_MAX_RENEWALS: u32 = 3;

/// Extension length used unless configured otherwise
pub const DEFAULT_EXTENSION_POLICY: ExtensionPolicy = ExtensionPolicy::HalveFirst;

/// Reaction counted as an objection unless configured otherwise
pub const DEFAULT_OBJECTION_EMOJI: &str = "✋";

/// How long each extension lasts, relative to the base duration `B`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionPolicy {
    /// First extension `B/2`, every later one `B`
    HalveFirst,
    /// First extension `B`, every later one `B/2`
    HalveAfterFirst,
}

impl ExtensionPolicy {
    /// Extension length in ms for a proposal already extended `num_extensions` times
    pub fn extension_ms(&self, base_ms: i64, num_extensions: u32) -> i64 {
        let first = num_extensions == 0;
        match (self, first) {
            (Self::HalveFirst, true) | (Self::HalveAfterFirst, false) => base_ms / 2,
            (Self::HalveFirst, false) | (Self::HalveAfterFirst, true) => base_ms,
        }
    }
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        DEFAULT_EXTENSION_POLICY
    }
}

impl std::fmt::Display for ExtensionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HalveFirst => write!(f, "halve-first"),
            Self::HalveAfterFirst => write!(f, "halve-after-first"),
        }
    }
}

/// Rules a vote is run under
#[derive(Debug, Clone, PartialEq)]
pub struct VoteRules {
    pub max_renewals: u32,
    pub policy: ExtensionPolicy,
    pub objection_emoji: String,
    /// Reaction the proposer applies to withdraw; none disables cancellation
    pub cancel_emoji: Option<String>,
}

impl Default for VoteRules {
    fn default() -> Self {
        Self {
            max_renewals: DEFAULT_MAX_RENEWALS,
            policy: DEFAULT_EXTENSION_POLICY,
            objection_emoji: DEFAULT_OBJECTION_EMOJI.to_string(),
            cancel_emoji: None,
        }
    }
}

/// What to do with a vote at its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proposer withdrew the vote
    Cancel,
    /// At most the seed objection remains
    Approve,
    /// Objections remain and renewals are exhausted
    Deny,
    /// Objections remain; push the deadline out by `extend_ms`
    Extend { extend_ms: i64 },
}

/// Decide a vote's fate
///
/// `objections` includes the bot's own seed reaction, so a count of 1 means
/// nobody objected.
pub fn decide(objections: u32, cancelled: bool, num_extensions: u32, base_ms: i64, rules: &VoteRules) -> Decision {
    debug!(objections, cancelled, num_extensions, base_ms, "decide: called");
    if cancelled {
        return Decision::Cancel;
    }
    if objections <= 1 {
        return Decision::Approve;
    }
    if num_extensions > rules.max_renewals {
        return Decision::Deny;
    }
    Decision::Extend {
        extend_ms: rules.policy.extension_ms(base_ms, num_extensions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: i64 = 24 * 3_600_000;

    #[test]
    fn test_halve_first_policy() {
        let p = ExtensionPolicy::HalveFirst;
        assert_eq!(p.extension_ms(B, 0), B / 2);
        assert_eq!(p.extension_ms(B, 1), B);
        assert_eq!(p.extension_ms(B, 3), B);
    }

    #[test]
    fn test_halve_after_first_policy() {
        let p = ExtensionPolicy::HalveAfterFirst;
        assert_eq!(p.extension_ms(B, 0), B);
        assert_eq!(p.extension_ms(B, 1), B / 2);
        assert_eq!(p.extension_ms(B, 3), B / 2);
    }

    #[test]
    fn test_default_policy_is_halve_first() {
        assert_eq!(ExtensionPolicy::default(), ExtensionPolicy::HalveFirst);
        assert_eq!(VoteRules::default().policy, ExtensionPolicy::HalveFirst);
    }

    #[test]
    fn test_approve_at_or_below_seed() {
        let rules = VoteRules::default();
        assert_eq!(decide(0, false, 0, B, &rules), Decision::Approve);
        assert_eq!(decide(1, false, 0, B, &rules), Decision::Approve);
        assert_eq!(decide(1, false, 9, B, &rules), Decision::Approve);
    }

    #[test]
    fn test_extend_until_renewals_exhausted() {
        let rules = VoteRules::default();
        assert_eq!(decide(2, false, 0, B, &rules), Decision::Extend { extend_ms: B / 2 });
        assert_eq!(decide(5, false, 3, B, &rules), Decision::Extend { extend_ms: B });
        assert_eq!(decide(2, false, 4, B, &rules), Decision::Deny);
    }

    #[test]
    fn test_custom_max_renewals() {
        let rules = VoteRules {
            max_renewals: 0,
            ..VoteRules::default()
        };
        assert!(matches!(decide(2, false, 0, B, &rules), Decision::Extend { .. }));
        assert_eq!(decide(2, false, 1, B, &rules), Decision::Deny);
    }

    #[test]
    fn test_cancel_takes_priority() {
        let rules = VoteRules::default();
        assert_eq!(decide(10, true, 0, B, &rules), Decision::Cancel);
        assert_eq!(decide(0, true, 9, B, &rules), Decision::Cancel);
    }

    #[test]
    fn test_policy_serde_names() {
        let p: ExtensionPolicy = serde_yaml::from_str("halve-after-first").unwrap();
        assert_eq!(p, ExtensionPolicy::HalveAfterFirst);
        assert_eq!(ExtensionPolicy::HalveFirst.to_string(), "halve-first");
    }
}
