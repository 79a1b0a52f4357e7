//! Core error types for MODELJOIN.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Document could not be encoded or decoded
    InvalidEncoding {
        /// Decoder message
        reason: String,
    },

    /// Invalid identifier
    InvalidId {
        /// Why the id was rejected
        reason: String,
    },

    /// Validation error
    Validation {
        /// Field or component that failed
        field: String,
        /// What was wrong
        reason: String,
    },

    /// Not found
    NotFound {
        /// Kind of item
        kind: String,
        /// Id that was looked up
        id: String,
    },

    /// Already exists
    AlreadyExists {
        /// Kind of item
        kind: String,
        /// Conflicting id
        id: String,
    },

    /// Filesystem failure
    Io {
        /// Path involved, empty when unknown
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// Cancelled by the host
    Cancelled,

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl CoreError {
    /// Build an I/O error for a known path
    #[must_use]
    pub fn io(path: impl AsRef<std::path::Path>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding { reason } => write!(f, "Invalid encoding: {}", reason),
            Self::InvalidId { reason } => write!(f, "Invalid ID: {}", reason),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::AlreadyExists { kind, id } => write!(f, "{} already exists: {}", kind, id),
            Self::Io { path, reason } if path.is_empty() => write!(f, "I/O error: {}", reason),
            Self::Io { path, reason } => write!(f, "I/O error at {}: {}", path, reason),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: String::new(),
            reason: err.to_string(),
        }
    }
}
