//! Chat platform seam
//!
//! The vote engine talks to the chat platform only through [`ChatPlatform`]:
//! threads for discussion, messages for announcements and notices, and
//! reactions as the voting signal.

mod discord;
mod error;
mod memory;
mod types;

use async_trait::async_trait;

pub use discord::{DiscordClient, DiscordConfig};
pub use error::ChatError;
pub use memory::{BOT_USER_ID, MemoryChat, Post, Thread};
pub use types::{ChatMessage, Reaction};

/// Operations the bot needs from a chat platform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Open a public discussion thread in a channel, returning its ID
    async fn create_thread(&self, channel_id: &str, name: &str) -> Result<String, ChatError>;

    /// Add a user to a thread
    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), ChatError>;

    /// Post a message, returning its ID
    async fn post_message(&self, channel_id: &str, content: &str) -> Result<String, ChatError>;

    /// React to a message as the bot
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), ChatError>;

    /// Fetch a message with its reaction tallies
    ///
    /// `Ok(None)` means the message (or its channel) no longer exists.
    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<Option<ChatMessage>, ChatError>;

    /// IDs of the users who reacted to a message with `emoji`
    async fn reaction_users(&self, channel_id: &str, message_id: &str, emoji: &str)
    -> Result<Vec<String>, ChatError>;
}
