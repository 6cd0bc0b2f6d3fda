//! Completion response extraction.
//!
//! The body is decoded level by level into small record types. The first level
//! that does not have the expected shape decides the error kind.

use crate::error::CompletionError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Longest body prefix quoted in a `NoChoices` error.
const BODY_PREFIX_BYTES: usize = 100;

#[derive(Debug, Default, Deserialize)]
struct CompletionEnvelope {
    /// `Some` whenever the key is present, even as `null`.
    #[serde(default, deserialize_with = "present")]
    error: Option<Value>,
    #[serde(default)]
    choices: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChoiceRecord {
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MessageRecord {
    #[serde(default)]
    content: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Decode `value` as a record, accepting only JSON objects.
fn record<T: DeserializeOwned>(value: Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Leading bytes of the body, cut back to a character boundary.
fn body_prefix(raw: &[u8]) -> String {
    let head = &raw[..raw.len().min(BODY_PREFIX_BYTES)];
    match std::str::from_utf8(head) {
        Ok(text) => text.to_string(),
        Err(e) => String::from_utf8_lossy(&head[..e.valid_up_to()]).into_owned(),
    }
}

/// Extract the assistant's text from a raw completion response body.
///
/// A body that is not a JSON object is treated as having no choices.
pub fn extract(raw: &[u8]) -> Result<String, CompletionError> {
    let envelope: CompletionEnvelope = serde_json::from_slice(raw).unwrap_or_default();

    if let Some(error) = envelope.error {
        let payload = match error {
            Value::String(text) => text,
            other => other.to_string(),
        };
        return Err(CompletionError::ApiError(payload));
    }

    let first = match envelope.choices {
        Some(Value::Array(choices)) if !choices.is_empty() => {
            choices.into_iter().next().unwrap_or(Value::Null)
        }
        _ => {
            return Err(CompletionError::NoChoices {
                body_prefix: body_prefix(raw),
            })
        }
    };

    let choice: ChoiceRecord = record(first).ok_or(CompletionError::MalformedChoice)?;

    let message: MessageRecord = choice
        .message
        .and_then(record)
        .ok_or(CompletionError::MalformedMessage)?;

    match message.content {
        Some(Value::String(content)) => Ok(content),
        _ => Err(CompletionError::MissingContent),
    }
}
