//! Relay Core - per-user sessions, rate limiting, and bounded conversation history.
//!
//! This crate owns everything between an inbound chat message and the reply text:
//! - Sliding-window rate limiting per user
//! - A concurrent session store with get-or-create semantics
//! - Conversation history with a pinned system turn and bounded length
//! - Completion request building and response extraction
//! - A pluggable system prompt policy and completion transport
//!
//! ## Flow
//!
//! ```text
//! message → rate limit → append user turn → build request → transport
//!                                                              ↓
//!                 reply ← append assistant turn ← extract response
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod error;
pub mod history;
pub mod policy;
pub mod rate_limit;
pub mod relay;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;
pub mod types;

pub use error::{CompletionError, RelayError, TransportError};
pub use history::ConversationHistory;
pub use policy::{PrivilegedPromptPolicy, PromptPolicy};
pub use rate_limit::{ActivityLog, SlidingWindowLimiter};
pub use relay::ChatRelay;
pub use request::CompletionRequest;
pub use response::extract;
pub use session::{InMemorySessionStore, Session, SessionState, SessionStore};
pub use transport::{CompletionTransport, OpenRouterTransport};
pub use types::{Role, Turn, UserId};
