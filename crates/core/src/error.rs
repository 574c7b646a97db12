//! # Scout Errors
//!
//! Error taxonomy for the evaluation pipeline.
//!
//! Only [`ScoutError::Parse`] is fatal for a run. Every other variant is
//! caught inside the stage that produced it and turned into a degraded record
//! plus an entry in the run's error log.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by collaborators and pipeline stages
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Input text could not be normalized into a startup record
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The completion service failed or returned nothing usable
    #[error("Completion error: {message}")]
    Completion { message: String },

    /// A structured response did not match the expected record shape
    #[error("Decode error: expected {expected}: {message}")]
    Decode { expected: String, message: String },

    /// The search provider failed
    #[error("Search error: {message}")]
    Search { message: String },

    /// The statistical classifier failed
    #[error("Classifier error: {message}")]
    Classifier { message: String },

    /// An external call exceeded its time budget
    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScoutError {
    pub fn parse(message: impl Into<String>) -> Self {
        ScoutError::Parse {
            message: message.into(),
        }
    }

    pub fn completion(message: impl Into<String>) -> Self {
        ScoutError::Completion {
            message: message.into(),
        }
    }

    pub fn decode(expected: impl Into<String>, message: impl Into<String>) -> Self {
        ScoutError::Decode {
            expected: expected.into(),
            message: message.into(),
        }
    }

    pub fn search(message: impl Into<String>) -> Self {
        ScoutError::Search {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        ScoutError::Timeout {
            operation: operation.into(),
            timeout_ms: after.as_millis() as u64,
        }
    }

    /// Whether this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoutError::Parse { .. })
    }
}

impl From<serde_json::Error> for ScoutError {
    fn from(err: serde_json::Error) -> Self {
        ScoutError::Decode {
            expected: "json".to_string(),
            message: err.to_string(),
        }
    }
}

pub type ScoutResult<T> = Result<T, ScoutError>;
