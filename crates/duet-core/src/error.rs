//! Error types for the duet matchmaking core.

use thiserror::Error;

/// A shared error type for the duet core and its storage backends.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. "No match found" and
/// "not currently paired" are valid empty results, never errors.
#[derive(Error, Debug, Clone)]
pub enum DuetError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Profile store access error (read/write to the durable store failed)
    #[error("Store error: {0}")]
    Store(String),

    /// Delivery layer failure (message forward or notification failed)
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Asymmetric or stale pairing state detected; self-healed by the caller
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", etc.
        message: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DuetError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Creates a Store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Creates a Delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }

    /// Creates an InconsistentState error
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentState(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a retry at the orchestration layer is worthwhile.
    ///
    /// Store and IO failures are treated as transient (retried once with
    /// backoff); everything else fails the triggering action immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Io { .. })
    }
}

impl From<std::io::Error> for DuetError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

/// Result type alias using DuetError
pub type Result<T> = std::result::Result<T, DuetError>;
