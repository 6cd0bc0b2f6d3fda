//! Failure kinds surfaced by the relay core.
//!
//! None of these are fatal to the process; the boundary layer turns them
//! into user-facing text.

use thiserror::Error;

/// The completion API answered, but not with usable content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// The response carried a top-level `error` field
    #[error("API error: {0}")]
    ApiError(String),

    /// `choices` missing, not a list, or empty
    #[error("no choices returned from API. Response: {body_prefix}")]
    NoChoices { body_prefix: String },

    /// The first choice is not an object
    #[error("invalid choice format")]
    MalformedChoice,

    /// The choice's `message` is not an object
    #[error("invalid message format")]
    MalformedMessage,

    /// The message's `content` is missing or not text
    #[error("no content in message")]
    MissingContent,
}

/// The completion API could not be reached or its body could not be read.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Outcome of handling one inbound message.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The user exceeded the per-window cap; nothing was recorded
    #[error("rate limit exceeded: {limit} messages per {window_secs}s")]
    RateLimited { limit: usize, window_secs: u64 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl RelayError {
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
