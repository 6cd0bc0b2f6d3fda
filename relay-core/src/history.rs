//! Bounded conversation history with a pinned system turn.
//!
//! The first turn of a non-empty history is the system turn. Truncation drops the
//! oldest conversational turns and never the pinned one.

use crate::types::{Role, Turn};

/// Ordered turns for one user.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationHistory {
    /// Create an empty history holding at most `max_turns` entries (minimum 2).
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(2),
        }
    }

    /// Append a user turn, pinning `system_prompt` first if the history is empty.
    pub fn append_user(&mut self, system_prompt: &str, text: &str) {
        if self.turns.is_empty() {
            self.turns.push(Turn::system(system_prompt));
        }
        self.turns.push(Turn::user(text));
        self.truncate();
    }

    pub fn append_assistant(&mut self, text: &str) {
        self.turns.push(Turn::assistant(text));
        self.truncate();
    }

    fn truncate(&mut self) {
        let len = self.turns.len();
        if len <= self.max_turns {
            return;
        }

        let excess = len - self.max_turns;
        if self.is_pinned() {
            self.turns.drain(1..=excess);
        } else {
            self.turns.drain(..excess);
        }
    }

    fn is_pinned(&self) -> bool {
        self.turns
            .first()
            .is_some_and(|turn| turn.role() == Role::System)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn system_turn(&self) -> Option<&Turn> {
        self.turns.first().filter(|_| self.is_pinned())
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
