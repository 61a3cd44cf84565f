//! Chat platform types

use serde::{Deserialize, Serialize};

/// One emoji's reaction tally on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub count: u32,
}

/// A message as seen when polling its reactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    pub reactions: Vec<Reaction>,
}

impl ChatMessage {
    /// Reaction count for `emoji`; an absent reaction counts as zero
    pub fn reaction_count(&self, emoji: &str) -> u32 {
        self.reactions
            .iter()
            .find(|r| r.emoji == emoji)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    pub fn has_reaction(&self, emoji: &str) -> bool {
        self.reaction_count(emoji) > 0
    }
}
