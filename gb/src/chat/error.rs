//! Chat platform errors

use std::time::Duration;

use thiserror::Error;

/// Discord JSON error code for an action the channel type does not allow
pub const INVALID_CHANNEL_TYPE_CODE: &str = "50024";

/// Errors from chat platform operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Chat platform unavailable: {0}")]
    Unavailable(String),
}

impl ChatError {
    /// Whether the target (channel, message, user) does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Whether the channel cannot hold the requested action, e.g. a thread inside a thread
    pub fn is_invalid_channel(&self) -> bool {
        matches!(self, Self::Api { status: 400, message } if message.contains(INVALID_CHANNEL_TYPE_CODE))
    }
}
