//! Configuration management for the chat relay.
//!
//! The relay reads an optional JSON file at `~/.chat-relay/config.json`
//! (or the path named by `RELAY_CONFIG`).
//!
//! # Configuration Priority
//!
//! 1. Environment variables (a `.env` file in the working directory is loaded first)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TELEGRAM_TOKEN` → telegram.bot_token
//! - `OPENROUTER_API_KEY` → llm.api_key
//! - `RELAY_MODEL` → llm.model
//! - `RELAY_PRIVILEGED_USERS` → prompts.privileged_users (comma-separated)
//! - `RELAY_LOG_LEVEL` → observability.log_level
//! - `RELAY_LOG_FORMAT` → observability.log_format

use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".chat-relay"),
        |dirs| dirs.home_dir().join(".chat-relay"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Sections
// ============================================================================

/// Telegram channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token (usually supplied through `TELEGRAM_TOKEN`)
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Usernames or numeric ids allowed to talk to the bot; `*` admits everyone
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,

    /// Long-poll timeout for `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: default_allowed_users(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".into()]
}

fn default_poll_timeout() -> u64 {
    60
}

/// Completion API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (usually supplied through `OPENROUTER_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Completion model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Whole-request timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}

fn default_llm_model() -> String {
    "nvidia/nemotron-3-nano-30b-a3b:free".into()
}

fn default_llm_timeout() -> u64 {
    120
}

/// Per-user sliding-window rate limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Messages admitted per user within one window
    #[serde(default = "default_max_per_window")]
    pub max_per_window: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_per_window: default_max_per_window(),
        }
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_per_window() -> usize {
    10
}

/// Conversation history bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum turns kept per user, including the pinned system turn
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    21
}

/// System prompt selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Prompt used for everyone not listed in `privileged_users`
    #[serde(default = "default_prompt")]
    pub default: String,

    /// Prompt used for privileged users
    #[serde(default = "default_privileged_prompt")]
    pub privileged: String,

    /// Numeric user ids that receive the privileged prompt
    #[serde(default)]
    pub privileged_users: Vec<i64>,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            default: default_prompt(),
            privileged: default_privileged_prompt(),
            privileged_users: Vec::new(),
        }
    }
}

fn default_prompt() -> String {
    "Answer briefly and to the point, without filler.".into()
}

fn default_privileged_prompt() -> String {
    "Answer as an intelligent and sarcastic conversation partner, keeping replies short.".into()
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load `.env`, the config file, and environment overrides.
    pub fn load_with_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("Failed to load .env file: {e}"))),
        }

        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(key) = lookup("OPENROUTER_API_KEY").filter(|v| !v.is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("RELAY_MODEL").filter(|v| !v.is_empty()) {
            self.llm.model = model;
        }
        if let Some(users) = lookup("RELAY_PRIVILEGED_USERS") {
            let parsed: Vec<i64> = users
                .split(',')
                .filter_map(|id| {
                    let id = id.trim();
                    match id.parse() {
                        Ok(id) => Some(id),
                        Err(_) if id.is_empty() => None,
                        Err(_) => {
                            tracing::warn!(value = %id, "Ignoring invalid privileged user id");
                            None
                        }
                    }
                })
                .collect();
            self.prompts.privileged_users = parsed;
        }
        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("RELAY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}
