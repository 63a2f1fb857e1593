//! Error types for Carewatch

use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors that can occur while ingesting records or running the session
#[derive(Debug, Error)]
pub enum CareError {
    #[error("Malformed field '{field}' (value {value:?}): {reason}")]
    MalformedField {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl CareError {
    pub(crate) fn malformed(field: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CareError::MalformedField {
            field: field.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to build an alert from a single event.
///
/// The rule engine records these and moves on to the next event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("{device_id} @ {timestamp}: threshold flag '{field}' set but reading is missing")]
    MissingReading {
        device_id: String,
        timestamp: NaiveDateTime,
        field: &'static str,
    },

    #[error("{device_id} @ {timestamp}: required field '{field}' is missing")]
    MissingField {
        device_id: String,
        timestamp: NaiveDateTime,
        field: &'static str,
    },
}
