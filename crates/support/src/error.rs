//! Error types for tidepool-support

use thiserror::Error;

/// Support type errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupportError {
    /// Input was not valid JSON
    #[error("Invalid JSON: {message}")]
    InvalidJson {
        /// Parser message, including line and column
        message: String,
    },

    /// Parsed JSON was valid but not an object
    #[error("Expected a JSON object, found {found}")]
    NotAnObject {
        /// Kind of the value that was found
        found: &'static str,
    },

    /// A key was present but held a different kind of value
    #[error("Key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        /// Key that was looked up
        key: String,
        /// Kind the caller asked for
        expected: &'static str,
        /// Kind actually stored
        found: &'static str,
    },
}

impl SupportError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson { .. } => "SUPPORT:JSON:PARSE",
            Self::NotAnObject { .. } => "SUPPORT:JSON:NOT_OBJECT",
            Self::TypeMismatch { .. } => "SUPPORT:JSON:TYPE",
        }
    }

    /// Create type mismatch error
    pub fn type_mismatch(key: &str, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.to_string(),
            expected,
            found,
        }
    }
}

impl From<serde_json::Error> for SupportError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: error.to_string(),
        }
    }
}

/// Result type for support operations
pub type SupportResult<T> = Result<T, SupportError>;
