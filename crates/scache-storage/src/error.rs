//! Storage error types.

use std::fmt;

/// Errors a storage backend can report.
///
/// A missing record is not an error for lookups (they return `Ok(None)`);
/// `NotFound` is reserved for mutations that require an existing record.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The record a mutation targets does not exist.
    #[error("Record not found: {table}/{id}")]
    NotFound {
        /// The table the record was looked up in.
        table: String,
        /// The id that was not found.
        id: String,
    },

    /// Attempted to create a record whose id already exists.
    #[error("Record already exists: {table}/{id}")]
    AlreadyExists {
        /// The table the record belongs to.
        table: String,
        /// The conflicting id.
        id: String,
    },

    /// The record or update payload is invalid.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of why the record is invalid.
        message: String,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// The backend does not support the requested operation.
    #[error("Unsupported operation: {message}")]
    Unsupported {
        /// Which operation and why.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    #[must_use]
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn already_exists(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            table: table.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if the backend could not be reached.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionError { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Unsupported { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_record(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record not found.
    NotFound,
    /// Conflicting existence.
    Conflict,
    /// Validation error.
    Validation,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("commodity", "1");
        assert_eq!(err.to_string(), "Record not found: commodity/1");

        let err = StorageError::already_exists("commodity", "2");
        assert_eq!(err.to_string(), "Record already exists: commodity/2");

        let err = StorageError::unsupported("list_all");
        assert_eq!(err.to_string(), "Unsupported operation: list_all");
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("commodity", "1");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
        assert!(!err.is_connection_error());

        let err = StorageError::connection_error("refused");
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("t", "1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::already_exists("t", "1").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::invalid_record("bad").category(),
            ErrorCategory::Validation
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
