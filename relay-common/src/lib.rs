//! Relay Common - Shared types, utilities, and configuration for the chat relay.
//!
//! This crate provides:
//! - Configuration types and loading (file, `.env`, environment overrides)
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    Config, HistoryConfig, LlmConfig, ObservabilityConfig, PromptsConfig, RateLimitConfig,
    TelegramConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
