//! Message handling: rate limit, history, completion round trip.

use crate::error::RelayError;
use crate::policy::{PrivilegedPromptPolicy, PromptPolicy};
use crate::rate_limit::SlidingWindowLimiter;
use crate::request::CompletionRequest;
use crate::response;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::transport::CompletionTransport;
use crate::types::UserId;
use relay_common::config::Config;
use std::sync::Arc;
use std::time::Instant;

/// Relays user messages to the completion API and keeps per-user context.
pub struct ChatRelay {
    store: Arc<dyn SessionStore>,
    limiter: SlidingWindowLimiter,
    policy: Arc<dyn PromptPolicy>,
    transport: Arc<dyn CompletionTransport>,
    model: String,
}

impl ChatRelay {
    pub fn new(
        store: Arc<dyn SessionStore>,
        limiter: SlidingWindowLimiter,
        policy: Arc<dyn PromptPolicy>,
        transport: Arc<dyn CompletionTransport>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            limiter,
            policy,
            transport,
            model: model.into(),
        }
    }

    /// Wire a relay from configuration with an in-memory store.
    pub fn from_config(config: &Config, transport: Arc<dyn CompletionTransport>) -> Self {
        Self::new(
            Arc::new(InMemorySessionStore::new(config.history.max_turns)),
            SlidingWindowLimiter::from_config(&config.rate_limit),
            Arc::new(PrivilegedPromptPolicy::from_config(&config.prompts)),
            transport,
            config.llm.model.clone(),
        )
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Handle one inbound message and return the reply text.
    pub async fn handle(&self, user: UserId, text: &str) -> Result<String, RelayError> {
        self.handle_at(user, text, Instant::now()).await
    }

    /// Handle one inbound message as if it arrived at `now`.
    ///
    /// A rejected message leaves the session untouched. A failed completion
    /// keeps the user turn but adds no assistant turn.
    pub async fn handle_at(
        &self,
        user: UserId,
        text: &str,
        now: Instant,
    ) -> Result<String, RelayError> {
        let session = self.store.get_or_create(user);

        if !self.limiter.admit(&session, now) {
            return Err(RelayError::RateLimited {
                limit: self.limiter.max_per_window(),
                window_secs: self.limiter.window().as_secs(),
            });
        }

        let _turn = session.begin_turn().await;

        let system_prompt = self.policy.system_prompt(user);
        let request = {
            let mut state = session.lock();
            state.history.append_user(&system_prompt, text);
            CompletionRequest::from_history(&state.history, &self.model)
        };

        tracing::debug!(
            user_id = %user,
            transport = self.transport.name(),
            model = %self.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let body = self.transport.send(&request).await.map_err(|e| {
            tracing::warn!(user_id = %user, error = %e, "Completion transport failed");
            e
        })?;

        let reply = response::extract(&body).map_err(|e| {
            tracing::warn!(user_id = %user, error = %e, "Completion response rejected");
            e
        })?;

        session.lock().history.append_assistant(&reply);

        Ok(reply)
    }
}
