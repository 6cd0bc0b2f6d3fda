//! Telegram channel adapter.
//!
//! Long-polls the Bot API with `getUpdates` and answers with `sendMessage`
//! in HTML parse mode.

use crate::message::{ChannelMessage, InboundEvent, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use relay_common::config::TelegramConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram's per-message text limit, in characters.
const MAX_MESSAGE_LEN: usize = 4096;

/// Pause after a failed poll before trying again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Bot API types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

// ============================================================================
// Telegram Channel
// ============================================================================

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    allowed_users: Vec<String>,
    poll_timeout_secs: u64,
    api_base: String,
    client: reqwest::Client,
    /// Set by `init` from `getMe`
    bot_username: Option<String>,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    pub fn new(bot_token: String, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            poll_timeout_secs: 60,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            bot_username: None,
        }
    }

    /// Create from configuration. The bot token must be present.
    pub fn from_config(config: &TelegramConfig) -> relay_common::Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                relay_common::Error::Config(
                    "Telegram bot token not set. Set TELEGRAM_TOKEN env var.".into(),
                )
            })?;

        Ok(Self::new(token.to_string(), config.allowed_users.clone())
            .with_poll_timeout(config.poll_timeout_secs))
    }

    /// Point the channel at another Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    fn is_user_allowed(&self, identity: &str) -> bool {
        self.allowed_users.iter().any(|u| u == "*" || u == identity)
    }

    fn is_any_user_allowed<'a, I>(&self, identities: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        identities.into_iter().any(|id| self.is_user_allowed(id))
    }

    /// Call a Bot API method and unwrap the `{ok, result}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> ChannelResult<T> {
        let resp = self
            .client
            .post(self.api_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        let status = resp.status();
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| ChannelError::Protocol(format!("{method}: {e}")))?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(ChannelError::Protocol(format!(
                "{method} failed ({status}): {}",
                description.unwrap_or_default()
            ))),
        }
    }

    /// Fetch one batch of updates starting at `offset`.
    ///
    /// Returns the accepted messages and the offset for the next poll. The
    /// offset advances past every update, including ones that are skipped.
    pub async fn poll_once(&self, offset: i64) -> ChannelResult<(Vec<ChannelMessage>, i64)> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"]
        });
        let timeout = Duration::from_secs(self.poll_timeout_secs) + Duration::from_secs(10);

        let updates: Vec<Value> = self.call("getUpdates", &body, timeout).await?;

        let mut next = offset;
        let mut messages = Vec::new();
        for raw in updates {
            if let Some(id) = raw.get("update_id").and_then(Value::as_i64) {
                next = next.max(id + 1);
            }
            match serde_json::from_value::<Update>(raw) {
                Ok(update) => messages.extend(self.accept(update)),
                Err(e) => tracing::debug!(error = %e, "Skipping unreadable Telegram update"),
            }
        }

        Ok((messages, next))
    }

    /// Turn an update into a message if it is text from an allowed user.
    fn accept(&self, update: Update) -> Option<ChannelMessage> {
        let message = update.message?;
        let from = message.from?;
        let text = message.text?;
        let event = InboundEvent::classify(&text)?;

        let user_id = from.id.to_string();
        let mut identities = vec![user_id.as_str()];
        if let Some(ref name) = from.username {
            identities.push(name.as_str());
        }

        if !self.is_any_user_allowed(identities.iter().copied()) {
            tracing::warn!(
                user_id = %user_id,
                username = from.username.as_deref().unwrap_or("unknown"),
                "Telegram: ignoring message from unauthorized user"
            );
            return None;
        }

        let msg = ChannelMessage {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: message.chat.id,
            user_id: from.id,
            username: from.username,
            event,
            timestamp: i64::try_from(
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis(),
            )
            .unwrap_or(i64::MAX),
            trace_id: relay_common::logging::generate_trace_id(),
        };

        tracing::info!(
            channel = "telegram",
            trace_id = %msg.trace_id,
            user_id = msg.user_id,
            chat_id = msg.chat_id,
            sender = %msg.sender(),
            command = msg.event.is_command(),
            "IM message received"
        );

        Some(msg)
    }

    async fn send_chunk(&self, chat_id: i64, html: &str) -> ChannelResult<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": html,
            "parse_mode": "HTML"
        });

        self.call::<Value>("sendMessage", &body, DEFAULT_REQUEST_TIMEOUT)
            .await
            .map(|_| ())
    }
}

/// Split a message into chunks of at most `max_chars` characters.
///
/// Prefers paragraph, line, sentence and word breaks in that order, and never
/// cuts an HTML entity in half.
fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..limit];
        let mut split = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(". ").map(|i| i + 1))
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        if let Some(amp) = window[..split].rfind('&') {
            if amp > 0 && !window[amp..split].contains(';') {
                split = amp;
            }
        }

        chunks.push(remaining[..split].to_string());
        remaining = remaining[split..].trim_start();
    }

    chunks
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        let me: TgUser = self
            .call("getMe", &serde_json::json!({}), DEFAULT_REQUEST_TIMEOUT)
            .await
            .map_err(|e| match e {
                ChannelError::Protocol(msg) => ChannelError::Auth(format!("Invalid bot token: {msg}")),
                other => other,
            })?;

        tracing::info!(
            bot_id = me.id,
            "Authorized on account {}",
            me.username.as_deref().unwrap_or("unknown")
        );
        self.bot_username = me.username;
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        for chunk in split_message(&message.html, MAX_MESSAGE_LEN) {
            self.send_chunk(message.chat_id, &chunk)
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        }

        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        while !tx.is_closed() {
            let messages = match self.poll_once(offset).await {
                Ok((messages, next)) => {
                    offset = next;
                    messages
                }
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            for message in messages {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
        }

        tracing::info!("Telegram listener stopped");
        Ok(())
    }

    async fn health_check(&self) -> ChannelResult<()> {
        self.call::<TgUser>("getMe", &serde_json::json!({}), DEFAULT_REQUEST_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::NotReady(e.to_string()))
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}
