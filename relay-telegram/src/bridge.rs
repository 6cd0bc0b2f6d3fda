//! Bridge between a chat channel and the relay.
//!
//! Commands are answered here and never reach the relay. Text messages go
//! through `ChatRelay::handle`, and every outcome is rendered as HTML for
//! the channel.

use crate::message::{ChannelMessage, InboundEvent, OutgoingMessage};
use crate::traits::{Channel, ChannelResult};
use relay_core::{ChatRelay, RelayError, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

pub const GREETING: &str = "👋 Hello!";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /start";

/// Routes inbound messages to the relay and replies on the channel.
pub struct RelayBridge<C: Channel> {
    relay: Arc<ChatRelay>,
    channel: Arc<C>,
}

impl<C: Channel + 'static> RelayBridge<C> {
    pub fn new(relay: Arc<ChatRelay>, channel: Arc<C>) -> Self {
        Self { relay, channel }
    }

    /// Build the reply for one inbound message.
    pub async fn respond(&self, message: &ChannelMessage) -> String {
        match &message.event {
            InboundEvent::Start => GREETING.to_string(),
            InboundEvent::UnknownCommand { command } => {
                tracing::debug!(command = %command, "Unknown command");
                UNKNOWN_COMMAND.to_string()
            }
            InboundEvent::Text { text } => {
                tracing::info!(
                    trace_id = %message.trace_id,
                    user_id = message.user_id,
                    "[{}] {}",
                    message.sender(),
                    text
                );
                let result = self.relay.handle(UserId::new(message.user_id), text).await;
                if let Err(ref e) = result {
                    tracing::error!(
                        trace_id = %message.trace_id,
                        user_id = message.user_id,
                        error = %e,
                        "Error getting AI response"
                    );
                }
                render_reply(&result)
            }
        }
    }

    /// Handle one message end to end: respond, then send.
    pub async fn process(&self, message: ChannelMessage) -> ChannelResult<()> {
        let reply = self.respond(&message).await;
        self.channel
            .send(OutgoingMessage::new(message.chat_id, reply))
            .await?;
        Ok(())
    }

    /// Spawn a task that processes messages from `rx`, each in its own task.
    ///
    /// Per-message tasks belong to the processor. Once `rx` closes it waits
    /// for the ones still running; aborting the processor aborts them too.
    pub fn spawn_processor(
        bridge: Arc<Self>,
        mut rx: mpsc::Receiver<ChannelMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(channel = bridge.channel.name(), "Relay bridge processor started");

            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    received = rx.recv() => {
                        let Some(message) = received else { break };
                        let bridge = bridge.clone();

                        in_flight.spawn(async move {
                            let trace_id = message.trace_id.clone();
                            if let Err(e) = bridge.process(message).await {
                                tracing::error!(trace_id = %trace_id, error = %e, "Failed to process message");
                            }
                        });
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        log_join(joined);
                    }
                }
            }

            if !in_flight.is_empty() {
                tracing::info!(pending = in_flight.len(), "Draining in-flight messages");
            }
            while let Some(joined) = in_flight.join_next().await {
                log_join(joined);
            }

            tracing::info!("Relay bridge processor stopped");
        })
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Message task failed");
    }
}

/// Render a relay outcome as HTML-safe reply text.
pub fn render_reply(result: &Result<String, RelayError>) -> String {
    match result {
        Ok(text) => html_escape::encode_text(text).into_owned(),
        Err(RelayError::RateLimited { limit, window_secs }) => {
            let window = if *window_secs == 60 {
                "minute".to_string()
            } else {
                format!("{window_secs} seconds")
            };
            format!("⏱️ Too many messages. Limit: {limit} messages per {window}")
        }
        Err(e) => format!("❌ Error: {}", html_escape::encode_text(&e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::{
        CompletionError, CompletionRequest, CompletionTransport, InMemorySessionStore,
        PrivilegedPromptPolicy, SessionStore, SlidingWindowLimiter, TransportError,
    };
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn init(&mut self) -> ChannelResult<()> {
            Ok(())
        }

        async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
            self.sent.lock().unwrap().push(message);
            Ok("1".into())
        }

        async fn listen(&self, _tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
            Ok(())
        }

        async fn health_check(&self) -> ChannelResult<()> {
            Ok(())
        }

        async fn shutdown(&self) -> ChannelResult<()> {
            Ok(())
        }
    }

    /// Wraps the last user turn in `<i>` after a short delay.
    struct EchoTransport;

    #[async_trait]
    impl CompletionTransport for EchoTransport {
        fn name(&self) -> &str {
            "echo"
        }

        async fn send(&self, request: &CompletionRequest) -> Result<Vec<u8>, TransportError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let last = request
                .messages
                .last()
                .map(|t| t.content().to_string())
                .unwrap_or_default();
            Ok(serde_json::json!({"choices": [{"message": {"content": format!("<i>{last}</i>")}}]})
                .to_string()
                .into_bytes())
        }
    }

    fn bridge(max_per_window: usize) -> (RelayBridge<RecordingChannel>, Arc<RecordingChannel>) {
        let relay = ChatRelay::new(
            Arc::new(InMemorySessionStore::new(21)),
            SlidingWindowLimiter::new(Duration::from_secs(60), max_per_window),
            Arc::new(PrivilegedPromptPolicy::new("be brief", "be sarcastic")),
            Arc::new(EchoTransport),
            "test/model",
        );
        let channel = Arc::new(RecordingChannel::default());
        (RelayBridge::new(Arc::new(relay), channel.clone()), channel)
    }

    fn message(event: InboundEvent) -> ChannelMessage {
        ChannelMessage {
            id: "m1".into(),
            chat_id: 500,
            user_id: 42,
            username: Some("alice".into()),
            event,
            timestamp: 0,
            trace_id: "trace".into(),
        }
    }

    #[test]
    fn test_render_success_is_escaped() {
        let reply = render_reply(&Ok("a < b && <b>c</b>".into()));
        assert_eq!(reply, "a &lt; b &amp;&amp; &lt;b&gt;c&lt;/b&gt;");
    }

    #[test]
    fn test_render_rate_limited() {
        let reply = render_reply(&Err(RelayError::RateLimited {
            limit: 10,
            window_secs: 60,
        }));
        assert_eq!(reply, "⏱️ Too many messages. Limit: 10 messages per minute");

        let reply = render_reply(&Err(RelayError::RateLimited {
            limit: 3,
            window_secs: 30,
        }));
        assert!(reply.ends_with("3 messages per 30 seconds"));
    }

    #[test]
    fn test_render_error_message() {
        let reply = render_reply(&Err(RelayError::Completion(CompletionError::ApiError(
            "<quota>".into(),
        ))));
        assert_eq!(reply, "❌ Error: API error: &lt;quota&gt;");

        let reply = render_reply(&Err(RelayError::Transport(TransportError::Timeout)));
        assert!(reply.starts_with("❌ Error: "));
    }

    #[tokio::test]
    async fn test_start_does_not_touch_relay() {
        let (bridge, channel) = bridge(10);
        bridge.process(message(InboundEvent::Start)).await.unwrap();

        let sent = channel.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![OutgoingMessage::new(500, GREETING)]);
        assert!(bridge.relay.store().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_hint() {
        let (bridge, channel) = bridge(10);
        bridge
            .process(message(InboundEvent::UnknownCommand {
                command: "help".into(),
            }))
            .await
            .unwrap();

        assert_eq!(channel.sent.lock().unwrap()[0].html, UNKNOWN_COMMAND);
        assert!(bridge.relay.store().is_empty());
    }

    #[tokio::test]
    async fn test_text_round_trip_is_escaped() {
        let (bridge, channel) = bridge(10);
        bridge
            .process(message(InboundEvent::Text { text: "2+2?".into() }))
            .await
            .unwrap();

        let sent = channel.sent.lock().unwrap().clone();
        assert_eq!(sent[0].chat_id, 500);
        assert_eq!(sent[0].html, "&lt;i&gt;2+2?&lt;/i&gt;");
    }

    #[tokio::test]
    async fn test_rate_limited_user_is_told() {
        let (bridge, channel) = bridge(1);
        for _ in 0..2 {
            bridge
                .process(message(InboundEvent::Text { text: "hi".into() }))
                .await
                .unwrap();
        }

        let sent = channel.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].html.contains("Limit: 1 messages per minute"));
    }

    #[tokio::test]
    async fn test_processor_handles_queued_messages() {
        let (bridge, channel) = bridge(10);
        let (tx, rx) = mpsc::channel(8);
        let handle = RelayBridge::spawn_processor(Arc::new(bridge), rx);

        for user_id in 1..=3 {
            let mut msg = message(InboundEvent::Text { text: "hi".into() });
            msg.user_id = user_id;
            msg.chat_id = user_id;
            tx.send(msg).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        // The processor only exits after every reply has gone out.
        let mut chats: Vec<i64> = channel.sent.lock().unwrap().iter().map(|m| m.chat_id).collect();
        chats.sort_unstable();
        assert_eq!(chats, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_aborting_processor_cancels_message_tasks() {
        let (bridge, channel) = bridge(10);
        let (tx, rx) = mpsc::channel(8);
        let handle = RelayBridge::spawn_processor(Arc::new(bridge), rx);

        tx.send(message(InboundEvent::Text { text: "hi".into() }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(channel.sent.lock().unwrap().is_empty());
    }
}
