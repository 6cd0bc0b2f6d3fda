//! Outbound completion request payload.

use crate::history::ConversationHistory;
use crate::session::Session;
use crate::types::Turn;
use serde::{Deserialize, Serialize};

/// Chat completion request body: model plus the conversation in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Turn>,
}

impl CompletionRequest {
    /// Build from a history. The payload owns a copy of every turn.
    pub fn from_history(history: &ConversationHistory, model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: history.turns().to_vec(),
        }
    }

    /// Build from a session's current history.
    pub fn build(session: &Session, model: &str) -> Self {
        Self::from_history(&session.lock().history, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn session_with_turns() -> Session {
        let session = Session::new(UserId::new(1), 21);
        {
            let mut state = session.lock();
            state.history.append_user("be brief", "2+2?");
            state.history.append_assistant("4");
        }
        session
    }

    #[test]
    fn test_build_copies_history_in_order() {
        let session = session_with_turns();
        let request = CompletionRequest::build(&session, "test/model");

        assert_eq!(request.model, "test/model");
        assert_eq!(
            request.messages,
            vec![Turn::system("be brief"), Turn::user("2+2?"), Turn::assistant("4")]
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let session = session_with_turns();
        let first = CompletionRequest::build(&session, "m");
        let second = CompletionRequest::build(&session, "m");
        assert_eq!(first, second);
    }

    #[test]
    fn test_mutating_payload_leaves_history_alone() {
        let session = session_with_turns();
        let mut request = CompletionRequest::build(&session, "m");
        request.messages.clear();
        request.messages.push(Turn::user("injected"));

        let state = session.lock();
        assert_eq!(state.history.len(), 3);
        assert_eq!(state.history.turns()[1], Turn::user("2+2?"));
    }

    #[test]
    fn test_wire_shape() {
        let session = session_with_turns();
        let json = serde_json::to_value(CompletionRequest::build(&session, "m")).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "model": "m",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "2+2?"},
                    {"role": "assistant", "content": "4"}
                ]
            })
        );
    }
}
