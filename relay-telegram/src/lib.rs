//! Relay Telegram - Telegram boundary for the chat relay.
//!
//! Long-polls Telegram for messages, answers commands directly, hands text to
//! the relay and sends the rendered reply back to the chat.
//!
//! ## Architecture
//!
//! ```text
//! Telegram → getUpdates → TelegramChannel → mpsc → RelayBridge → ChatRelay
//!                                                      ↓
//! Telegram ←── sendMessage ←──────── render_reply ←── reply
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bridge;
pub mod message;
pub mod telegram;
pub mod traits;

pub use bridge::{render_reply, RelayBridge};
pub use message::{ChannelMessage, InboundEvent, OutgoingMessage};
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelError, ChannelResult};

use relay_common::config::Config;
use relay_core::{ChatRelay, OpenRouterTransport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Inbound messages buffered between the listener and the bridge.
const INBOUND_QUEUE: usize = 256;

/// How long shutdown waits for in-flight replies.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the relay and Telegram channel from configuration and serve until
/// ctrl-c.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let transport = OpenRouterTransport::from_config(&config.llm)?;
    let relay = Arc::new(ChatRelay::from_config(config, Arc::new(transport)));

    let mut telegram = TelegramChannel::from_config(&config.telegram)?;
    telegram.init().await?;

    tracing::info!(
        model = relay.model(),
        limit = relay.limiter().max_per_window(),
        window_secs = relay.limiter().window().as_secs(),
        "Relay ready"
    );

    serve(relay, Arc::new(telegram), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    })
    .await
}

/// Listen on `channel` and process messages through `relay` until `shutdown`
/// resolves or the listener stops.
pub async fn serve<C, S>(relay: Arc<ChatRelay>, channel: Arc<C>, shutdown: S) -> anyhow::Result<()>
where
    C: Channel + 'static,
    S: Future<Output = ()>,
{
    channel.health_check().await?;

    let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

    let bridge = Arc::new(RelayBridge::new(relay, channel.clone()));
    let mut processor = RelayBridge::spawn_processor(bridge, rx);

    let mut listener = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.listen(tx).await })
    };

    let (outcome, listener_done) = tokio::select! {
        () = shutdown => {
            tracing::info!("Shutdown signal received");
            (Ok(()), false)
        }
        joined = &mut listener => {
            let outcome = match joined {
                Ok(Ok(())) => {
                    tracing::warn!("Listener stopped");
                    Ok(())
                }
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("channel listener failed")),
                Err(e) => Err(anyhow::Error::new(e).context("channel listener panicked")),
            };
            (outcome, true)
        }
    };

    // Stopping the listener drops the sender, which lets the processor drain.
    if !listener_done {
        listener.abort();
        let _ = listener.await;
    }

    if tokio::time::timeout(DRAIN_TIMEOUT, &mut processor).await.is_err() {
        tracing::warn!("In-flight messages did not finish in time, aborting");
        processor.abort();
    }
    channel.shutdown().await?;

    outcome
}
