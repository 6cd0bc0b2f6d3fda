//! Channel traits for implementing chat adapters.

use crate::message::{ChannelMessage, OutgoingMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Unexpected API response: {0}")]
    Protocol(String),

    #[error("Channel not ready: {0}")]
    NotReady(String),
}

/// Chat channel adapter.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Connect and verify credentials.
    async fn init(&mut self) -> ChannelResult<()>;

    /// Send a message. Returns a local id for the delivery.
    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String>;

    /// Receive messages until `tx` is closed.
    ///
    /// Transient poll failures are logged and retried; this only returns once
    /// the receiving side has gone away.
    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()>;

    /// Check that the channel can still reach its service.
    async fn health_check(&self) -> ChannelResult<()>;

    /// Shutdown the channel gracefully.
    async fn shutdown(&self) -> ChannelResult<()>;
}
