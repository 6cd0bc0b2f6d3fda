//! Message types for channel communication.

use serde::{Deserialize, Serialize};

/// What an inbound message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// `/start`
    Start,
    /// Any other `/command`; carries the command name without the slash.
    UnknownCommand { command: String },
    /// Plain text for the relay.
    Text { text: String },
}

impl InboundEvent {
    /// Classify message text. Returns `None` for empty text.
    ///
    /// A leading `/` marks a command. A `@botname` suffix on the command is
    /// ignored, as are any arguments after it.
    pub fn classify(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }

        let Some(rest) = text.strip_prefix('/') else {
            return Some(Self::Text {
                text: text.to_string(),
            });
        };

        let word = rest.split(char::is_whitespace).next().unwrap_or_default();
        let command = word.split('@').next().unwrap_or_default();

        if command.is_empty() {
            return Some(Self::Text {
                text: text.to_string(),
            });
        }

        Some(match command {
            "start" => Self::Start,
            other => Self::UnknownCommand {
                command: other.to_string(),
            },
        })
    }

    pub const fn is_command(&self) -> bool {
        !matches!(self, Self::Text { .. })
    }
}

/// Inbound message from a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Local message id
    pub id: String,
    /// Chat to answer in
    pub chat_id: i64,
    /// Sender id; keys the user's session
    pub user_id: i64,
    /// Sender username, when the account has one
    pub username: Option<String>,
    pub event: InboundEvent,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    pub trace_id: String,
}

impl ChannelMessage {
    /// Username if present, else the numeric id.
    pub fn sender(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

/// Outgoing message. `html` is sent with HTML parse mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub html: String,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, html: impl Into<String>) -> Self {
        Self {
            chat_id,
            html: html.into(),
        }
    }
}
