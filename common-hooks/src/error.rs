//! Error types.

use thiserror::Error;

/// Failure reported by a server query or a manual process function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    /// Error message
    pub message: String,
}

impl QueryError {
    /// Create a new query error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<String> for QueryError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for QueryError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Errors returned by the fallible [`FormState`](crate::form_state::FormState) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// The key is not part of the form schema.
    #[error("Field '{0}' is not part of the form schema")]
    UnknownField(String),

    /// A `pattern` rule was given a regex that does not compile.
    #[error("Invalid pattern for field '{field}': {message}")]
    InvalidPattern {
        /// Field the rule was attached to.
        field: String,
        /// Regex compiler message.
        message: String,
    },

    /// The form values do not deserialize into the requested type.
    #[error("Failed to decode form values: {0}")]
    Decode(String),
}
