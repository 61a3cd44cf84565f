//! In-memory chat platform
//!
//! Records every thread, post, and reaction so callers can drive votes
//! without a network connection and inspect what the bot said.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::INVALID_CHANNEL_TYPE_CODE;
use super::{ChatError, ChatMessage, ChatPlatform, Reaction};

/// User ID the bot's own reactions are recorded under
pub const BOT_USER_ID: &str = "bot";

/// A message the bot posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub channel_id: String,
    pub message_id: String,
    pub content: String,
}

/// A thread the bot created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub channel_id: String,
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Default)]
struct StoredMessage {
    channel_id: String,
    /// emoji -> reacting user IDs, in reaction order
    reactions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct ChatState {
    next_id: u64,
    messages: HashMap<String, StoredMessage>,
    posts: Vec<Post>,
    threads: Vec<Thread>,
    unavailable: bool,
}

impl ChatState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        (1_000 + self.next_id).to_string()
    }
}

/// Chat platform held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryChat {
    state: Mutex<ChatState>,
}

impl MemoryChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message the bot posted, in order
    pub async fn posts(&self) -> Vec<Post> {
        self.state.lock().await.posts.clone()
    }

    /// Every thread the bot created, in order
    pub async fn threads(&self) -> Vec<Thread> {
        self.state.lock().await.threads.clone()
    }

    /// Add a user's reaction to a message
    pub async fn react(&self, message_id: &str, emoji: &str, user_id: &str) {
        debug!(%message_id, %emoji, %user_id, "MemoryChat::react: called");
        let mut state = self.state.lock().await;
        if let Some(message) = state.messages.get_mut(message_id) {
            let users = message.reactions.entry(emoji.to_string()).or_default();
            if !users.iter().any(|u| u == user_id) {
                users.push(user_id.to_string());
            }
        }
    }

    /// Remove a user's reaction from a message
    pub async fn unreact(&self, message_id: &str, emoji: &str, user_id: &str) {
        debug!(%message_id, %emoji, %user_id, "MemoryChat::unreact: called");
        let mut state = self.state.lock().await;
        if let Some(message) = state.messages.get_mut(message_id) {
            if let Some(users) = message.reactions.get_mut(emoji) {
                users.retain(|u| u != user_id);
                if users.is_empty() {
                    message.reactions.remove(emoji);
                }
            }
        }
    }

    /// Set the total count for `emoji`, keeping the bot's own reaction first
    pub async fn set_reaction_count(&self, message_id: &str, emoji: &str, count: usize) {
        debug!(%message_id, %emoji, count, "MemoryChat::set_reaction_count: called");
        let mut state = self.state.lock().await;
        if let Some(message) = state.messages.get_mut(message_id) {
            if count == 0 {
                message.reactions.remove(emoji);
                return;
            }
            let users = (0..count)
                .map(|i| {
                    if i == 0 {
                        BOT_USER_ID.to_string()
                    } else {
                        format!("voter-{}", i)
                    }
                })
                .collect();
            message.reactions.insert(emoji.to_string(), users);
        }
    }

    /// Delete a message, as a moderator would
    pub async fn delete_message(&self, message_id: &str) {
        debug!(%message_id, "MemoryChat::delete_message: called");
        self.state.lock().await.messages.remove(message_id);
    }

    /// Make reads fail with a transient error until switched back
    pub async fn set_unavailable(&self, unavailable: bool) {
        debug!(unavailable, "MemoryChat::set_unavailable: called");
        self.state.lock().await.unavailable = unavailable;
    }
}

#[async_trait]
impl ChatPlatform for MemoryChat {
    async fn create_thread(&self, channel_id: &str, name: &str) -> Result<String, ChatError> {
        debug!(%channel_id, %name, "MemoryChat::create_thread: called");
        let mut state = self.state.lock().await;
        if state.threads.iter().any(|t| t.id == channel_id) {
            return Err(ChatError::Api {
                status: 400,
                message: format!(
                    r#"{{"message": "Cannot execute action on this channel type", "code": {}}}"#,
                    INVALID_CHANNEL_TYPE_CODE
                ),
            });
        }
        let id = state.next_id();
        state.threads.push(Thread {
            id: id.clone(),
            channel_id: channel_id.to_string(),
            name: name.to_string(),
            members: Vec::new(),
        });
        Ok(id)
    }

    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), ChatError> {
        debug!(%thread_id, %user_id, "MemoryChat::add_thread_member: called");
        let mut state = self.state.lock().await;
        let thread = state
            .threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| ChatError::Api {
                status: 404,
                message: format!("Unknown thread {}", thread_id),
            })?;
        thread.members.push(user_id.to_string());
        Ok(())
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> Result<String, ChatError> {
        debug!(%channel_id, "MemoryChat::post_message: called");
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.messages.insert(
            id.clone(),
            StoredMessage {
                channel_id: channel_id.to_string(),
                reactions: BTreeMap::new(),
            },
        );
        state.posts.push(Post {
            channel_id: channel_id.to_string(),
            message_id: id.clone(),
            content: content.to_string(),
        });
        Ok(id)
    }

    async fn add_reaction(&self, _channel_id: &str, message_id: &str, emoji: &str) -> Result<(), ChatError> {
        debug!(%message_id, %emoji, "MemoryChat::add_reaction: called");
        let mut state = self.state.lock().await;
        let message = state.messages.get_mut(message_id).ok_or_else(|| ChatError::Api {
            status: 404,
            message: format!("Unknown message {}", message_id),
        })?;
        let users = message.reactions.entry(emoji.to_string()).or_default();
        if !users.iter().any(|u| u == BOT_USER_ID) {
            users.insert(0, BOT_USER_ID.to_string());
        }
        Ok(())
    }

    async fn fetch_message(&self, _channel_id: &str, message_id: &str) -> Result<Option<ChatMessage>, ChatError> {
        debug!(%message_id, "MemoryChat::fetch_message: called");
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(ChatError::Unavailable("memory chat marked unavailable".to_string()));
        }
        Ok(state.messages.get(message_id).map(|m| ChatMessage {
            id: message_id.to_string(),
            channel_id: m.channel_id.clone(),
            reactions: m
                .reactions
                .iter()
                .map(|(emoji, users)| Reaction {
                    emoji: emoji.clone(),
                    count: users.len() as u32,
                })
                .collect(),
        }))
    }

    async fn reaction_users(
        &self,
        _channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<String>, ChatError> {
        debug!(%message_id, %emoji, "MemoryChat::reaction_users: called");
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(ChatError::Unavailable("memory chat marked unavailable".to_string()));
        }
        Ok(state
            .messages
            .get(message_id)
            .and_then(|m| m.reactions.get(emoji))
            .cloned()
            .unwrap_or_default())
    }
}
