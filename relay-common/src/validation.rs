//! Configuration validation for the chat relay.
//!
//! Missing credentials and out-of-range limits are startup errors.

use thiserror::Error;

use crate::config::{
    Config, HistoryConfig, LlmConfig, ObservabilityConfig, RateLimitConfig, TelegramConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 5] = [
            &self.telegram,
            &self.llm,
            &self.rate_limit,
            &self.history,
            &self.observability,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }

    /// Load configuration with environment overrides and validate it.
    pub fn load_and_validate() -> crate::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate()?;
        Ok(config)
    }
}

fn require(value: Option<&str>, field: &str) -> ValidationResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::MissingField {
            field: field.into(),
        }),
    }
}

impl Validate for TelegramConfig {
    fn validate(&self) -> ValidationResult<()> {
        require(self.bot_token.as_deref(), "telegram.bot_token")
    }
}

impl Validate for LlmConfig {
    fn validate(&self) -> ValidationResult<()> {
        require(self.api_key.as_deref(), "llm.api_key")?;
        require(Some(self.model.as_str()), "llm.model")?;

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.window_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "rate_limit.window_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_per_window == 0 {
            return Err(ValidationError::InvalidValue {
                field: "rate_limit.max_per_window".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for HistoryConfig {
    fn validate(&self) -> ValidationResult<()> {
        // One pinned system turn plus at least one conversational turn.
        if self.max_turns < 2 {
            return Err(ValidationError::InvalidValue {
                field: "history.max_turns".into(),
                reason: format!("must be at least 2, got {}", self.max_turns),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
