//! Error types for carsharing.
//!
//! This module defines all error types used throughout the carsharing crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::ValidationError;

/// The main error type for carsharing operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Record Errors ===
    /// Input fields failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No car with the requested id exists.
    #[error("No car found with id: {id}")]
    CarNotFound {
        /// The id that was looked up.
        id: i64,
    },

    /// Every id above the highest one in use is taken.
    #[error("no {kind} ids left")]
    IdsExhausted {
        /// Which kind of record ran out of ids (`car` or `trip`).
        kind: &'static str,
    },

    // === Store Errors ===
    /// The persisted store is missing, unreadable, or holds invalid records.
    #[error("corrupt store at {path}: {message}")]
    CorruptStore {
        /// Path to the store file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// Writing the store back to disk failed.
    #[error("failed to write store at {path}: {source}")]
    StoreWrite {
        /// Path to the store file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for carsharing operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a corrupt store error.
    #[must_use]
    pub fn corrupt_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error means a referenced record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CarNotFound { .. })
    }

    /// Check if this error is a rejected input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
