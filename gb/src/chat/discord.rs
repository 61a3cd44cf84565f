//! Discord REST API client
//!
//! Implements ChatPlatform over the Discord HTTP API (v10) with a bot token.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{ChatError, ChatMessage, ChatPlatform, Reaction};

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Thread type for a public thread not attached to a message
const PUBLIC_THREAD: u8 = 11;

/// Thread auto-archive after one day of inactivity
const AUTO_ARCHIVE_MINUTES: u32 = 1440;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Connection settings for the Discord API
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token (without the `Bot ` prefix)
    pub token: String,

    /// API base URL, e.g. `https://discord.com/api/v10`
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: String,
    channel_id: String,
    #[serde(default)]
    reactions: Vec<ApiReaction>,
}

#[derive(Debug, Deserialize)]
struct ApiReaction {
    count: u32,
    emoji: ApiEmoji,
}

#[derive(Debug, Deserialize)]
struct ApiEmoji {
    id: Option<String>,
    name: Option<String>,
}

impl ApiEmoji {
    /// Unicode emoji as-is; custom emoji as `name:id`
    fn key(&self) -> String {
        match (&self.name, &self.id) {
            (Some(name), Some(id)) => format!("{}:{}", name, id),
            (Some(name), None) => name.clone(),
            (None, Some(id)) => id.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Discord bot client
pub struct DiscordClient {
    config: DiscordConfig,
    http: Client,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig) -> Result<Self, ChatError> {
        debug!(base_url = %config.base_url, "DiscordClient::new: called");
        if config.token.is_empty() {
            return Err(ChatError::InvalidResponse("Discord bot token is empty".to_string()));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, ChatError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ChatError::InvalidResponse(format!("Invalid base URL '{}': {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ChatError::InvalidResponse(format!("Base URL cannot be a base: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, retrying transient failures with jittered exponential backoff
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ChatError> {
        debug!(%method, %url, "send: called");
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                let jitter = rand::rng().random_range(0..=backoff / 4);
                warn!(attempt, backoff_ms = backoff + jitter, "send: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
            }

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header("Authorization", format!("Bot {}", self.config.token));
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "send: network error");
                    last_error = Some(ChatError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response);
            }

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(1.0);
                debug!(retry_after, "send: rate limited (429)");
                let retry_after = Duration::from_secs_f64(retry_after.max(0.0));
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(retry_after).await;
                    last_error = Some(ChatError::RateLimited { retry_after });
                    continue;
                }
                return Err(ChatError::RateLimited { retry_after });
            }

            let message = response.text().await.unwrap_or_default();
            if is_retryable_status(status) && attempt < MAX_RETRIES {
                debug!(attempt, status, "send: retryable error");
                last_error = Some(ChatError::Api { status, message });
                continue;
            }

            debug!(status, %message, "send: API error");
            return Err(ChatError::Api { status, message });
        }

        Err(last_error.unwrap_or_else(|| ChatError::Unavailable("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn create_thread(&self, channel_id: &str, name: &str) -> Result<String, ChatError> {
        debug!(%channel_id, %name, "create_thread: called");
        let url = self.url(&["channels", channel_id, "threads"])?;
        let body = json!({
            "name": name,
            "type": PUBLIC_THREAD,
            "auto_archive_duration": AUTO_ARCHIVE_MINUTES,
        });
        let thread: IdOnly = self.send(Method::POST, url, Some(body)).await?.json().await?;
        Ok(thread.id)
    }

    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), ChatError> {
        debug!(%thread_id, %user_id, "add_thread_member: called");
        let url = self.url(&["channels", thread_id, "thread-members", user_id])?;
        self.send(Method::PUT, url, None).await?;
        Ok(())
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> Result<String, ChatError> {
        debug!(%channel_id, len = content.len(), "post_message: called");
        let url = self.url(&["channels", channel_id, "messages"])?;
        let body = json!({
            "content": content,
            "allowed_mentions": { "parse": ["users"] },
        });
        let message: IdOnly = self.send(Method::POST, url, Some(body)).await?.json().await?;
        Ok(message.id)
    }

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), ChatError> {
        debug!(%channel_id, %message_id, %emoji, "add_reaction: called");
        let url = self.url(&["channels", channel_id, "messages", message_id, "reactions", emoji, "@me"])?;
        self.send(Method::PUT, url, None).await?;
        Ok(())
    }

    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<Option<ChatMessage>, ChatError> {
        debug!(%channel_id, %message_id, "fetch_message: called");
        let url = self.url(&["channels", channel_id, "messages", message_id])?;
        let response = match self.send(Method::GET, url, None).await {
            Ok(r) => r,
            Err(e) if e.is_not_found() => {
                debug!(%message_id, "fetch_message: message gone");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let message: ApiMessage = response.json().await?;
        Ok(Some(ChatMessage {
            id: message.id,
            channel_id: message.channel_id,
            reactions: message
                .reactions
                .into_iter()
                .map(|r| Reaction {
                    emoji: r.emoji.key(),
                    count: r.count,
                })
                .collect(),
        }))
    }

    async fn reaction_users(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<String>, ChatError> {
        debug!(%channel_id, %message_id, %emoji, "reaction_users: called");
        let mut url = self.url(&["channels", channel_id, "messages", message_id, "reactions", emoji])?;
        url.query_pairs_mut().append_pair("limit", "100");
        let users: Vec<IdOnly> = self.send(Method::GET, url, None).await?.json().await?;
        Ok(users.into_iter().map(|u| u.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DiscordClient {
        DiscordClient::new(DiscordConfig {
            token: "token".to_string(),
            base_url: "https://discord.com/api/v10".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = DiscordClient::new(DiscordConfig {
            token: String::new(),
            base_url: "https://discord.com/api/v10".to_string(),
            timeout: Duration::from_secs(5),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_url_encodes_emoji() {
        let url = client()
            .url(&["channels", "1", "messages", "2", "reactions", "✋", "@me"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://discord.com/api/v10/channels/1/messages/2/reactions/%E2%9C%8B/@me"
        );
    }

    #[test]
    fn test_url_trailing_slash_base() {
        let c = DiscordClient::new(DiscordConfig {
            token: "t".to_string(),
            base_url: "https://discord.com/api/v10/".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let url = c.url(&["channels", "9", "threads"]).unwrap();
        assert_eq!(url.as_str(), "https://discord.com/api/v10/channels/9/threads");
    }

    #[test]
    fn test_emoji_key() {
        let unicode = ApiEmoji {
            id: None,
            name: Some("✋".to_string()),
        };
        assert_eq!(unicode.key(), "✋");

        let custom = ApiEmoji {
            id: Some("123".to_string()),
            name: Some("nope".to_string()),
        };
        assert_eq!(custom.key(), "nope:123");
    }

    #[test]
    fn test_parse_message_reactions() {
        let raw = r#"{
            "id": "2",
            "channel_id": "1",
            "content": "vote",
            "reactions": [
                {"count": 3, "me": true, "emoji": {"id": null, "name": "✋"}}
            ]
        }"#;
        let message: ApiMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.reactions.len(), 1);
        assert_eq!(message.reactions[0].count, 3);
        assert_eq!(message.reactions[0].emoji.key(), "✋");
    }

    #[test]
    fn test_parse_message_without_reactions() {
        let message: ApiMessage = serde_json::from_str(r#"{"id": "2", "channel_id": "1"}"#).unwrap();
        assert!(message.reactions.is_empty());
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(502));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(403));
    }
}
