//! Error types for notion2sql.

use std::time::Duration;

use thiserror::Error;

use crate::query::{ParseError, PlanError};

/// The main error type for notion2sql operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request could not be sent or its body could not be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Notion answered with a non-success status
    #[error("Notion API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Still rate limited after all retries were spent
    #[error("Rate limited by Notion (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected user input (ids, keys, SQL text)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Property name not present in the database schema
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// Attempt to write a computed or system property
    #[error("Property '{name}' has read-only type '{property_type}'")]
    ReadOnlyProperty { name: String, property_type: String },

    /// Value shape does not fit the property type
    #[error("Property '{property}' expects {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: String,
        found: String,
    },

    /// SQL text could not be parsed
    #[error("SQL parse error: {0}")]
    Parse(#[from] ParseError),

    /// SQL statement could not be planned
    #[error("SQL plan error: {0}")]
    Plan(#[from] PlanError),

    /// SQL statement failed during execution
    #[error("Query error: {0}")]
    Query(String),

    /// Page, database or row not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Returns true for errors worth retrying at the HTTP layer.
    ///
    /// Only answers where Notion reported it did not apply the request
    /// qualify. A [`Error::Transport`] failure may follow a write that
    /// landed, so it is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == 429 || (500..600).contains(status),
            Error::RateLimited { .. } => true,
            _ => false,
        }
    }
}

/// A specialized `Result` type for notion2sql operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            status: 400,
            code: "validation_error".to_string(),
            message: "body failed validation".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Notion API error 400 (validation_error): body failed validation"
        );
    }

    #[test]
    fn test_retryable() {
        let conflict = Error::Api {
            status: 409,
            code: "conflict_error".to_string(),
            message: String::new(),
        };
        let unavailable = Error::Api {
            status: 503,
            code: "service_unavailable".to_string(),
            message: String::new(),
        };
        assert!(!conflict.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!Error::UnknownProperty("x".into()).is_retryable());
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(!Error::Transport("connection reset".into()).is_retryable());
    }
}
