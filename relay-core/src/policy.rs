//! System prompt selection.
//!
//! Which instructions a user's conversation starts with is decided outside the
//! core. Any `Fn(UserId) -> String` works as a policy.

use crate::types::UserId;
use relay_common::config::PromptsConfig;
use std::collections::HashSet;

/// Chooses the pinned system prompt for a user's conversation.
pub trait PromptPolicy: Send + Sync {
    fn system_prompt(&self, user: UserId) -> String;
}

impl<F> PromptPolicy for F
where
    F: Fn(UserId) -> String + Send + Sync,
{
    fn system_prompt(&self, user: UserId) -> String {
        self(user)
    }
}

/// Gives a distinguished set of users their own prompt; everyone else the default.
#[derive(Debug, Clone)]
pub struct PrivilegedPromptPolicy {
    privileged: HashSet<UserId>,
    privileged_prompt: String,
    default_prompt: String,
}

impl PrivilegedPromptPolicy {
    pub fn new(default_prompt: impl Into<String>, privileged_prompt: impl Into<String>) -> Self {
        Self {
            privileged: HashSet::new(),
            privileged_prompt: privileged_prompt.into(),
            default_prompt: default_prompt.into(),
        }
    }

    pub fn from_config(config: &PromptsConfig) -> Self {
        let mut policy = Self::new(config.default.clone(), config.privileged.clone());
        policy.privileged = config
            .privileged_users
            .iter()
            .copied()
            .map(UserId::new)
            .collect();
        policy
    }

    #[must_use]
    pub fn with_privileged(mut self, user: UserId) -> Self {
        self.privileged.insert(user);
        self
    }

    pub fn is_privileged(&self, user: UserId) -> bool {
        self.privileged.contains(&user)
    }
}

impl PromptPolicy for PrivilegedPromptPolicy {
    fn system_prompt(&self, user: UserId) -> String {
        if self.is_privileged(user) {
            self.privileged_prompt.clone()
        } else {
            self.default_prompt.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileged_user_gets_variant() {
        let policy = PrivilegedPromptPolicy::new("brief", "sarcastic").with_privileged(UserId::new(9));

        assert_eq!(policy.system_prompt(UserId::new(9)), "sarcastic");
        assert_eq!(policy.system_prompt(UserId::new(10)), "brief");
    }

    #[test]
    fn test_from_config() {
        let config = PromptsConfig {
            default: "d".into(),
            privileged: "p".into(),
            privileged_users: vec![1, 2],
        };
        let policy = PrivilegedPromptPolicy::from_config(&config);

        assert!(policy.is_privileged(UserId::new(1)));
        assert!(policy.is_privileged(UserId::new(2)));
        assert_eq!(policy.system_prompt(UserId::new(3)), "d");
    }

    #[test]
    fn test_closure_policy() {
        let policy = |user: UserId| format!("prompt for {user}");
        let policy: &dyn PromptPolicy = &policy;
        assert_eq!(policy.system_prompt(UserId::new(5)), "prompt for 5");
    }
}
