//! Error types for flightkeep.
//!
//! This module defines the error types used throughout the flightkeep crate.
//! Most durability failures are reported as outcomes rather than errors; the
//! variants here cover the store backends, configuration, import and the
//! auto-save scheduler.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flightkeep operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Store Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A write would push the store past its byte quota.
    #[error("storage quota exceeded writing '{key}': {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Total bytes the store would hold after the write.
        needed: usize,
        /// Configured quota in bytes.
        limit: usize,
    },

    /// The store's internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    StoreLock,

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

    // === Import Errors ===
    /// An imported file has no recognizable flights array.
    #[error("cannot import flights: {message}")]
    ImportFormat {
        /// Human-readable description of what is wrong with the file.
        message: String,
    },

    // === Scheduler Errors ===
    /// The auto-save scheduler could not be started.
    #[error("failed to start auto-save: {message}")]
    SchedulerStart {
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flightkeep operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an import format error.
    #[must_use]
    pub fn import_format(message: impl Into<String>) -> Self {
        Self::ImportFormat {
            message: message.into(),
        }
    }

    /// Create a scheduler start error.
    #[must_use]
    pub fn scheduler_start(message: impl Into<String>) -> Self {
        Self::SchedulerStart {
            message: message.into(),
        }
    }

    /// Check if this error means the store ran out of space.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Check if this error came from a rejected import file.
    #[must_use]
    pub fn is_import_format(&self) -> bool {
        matches!(self, Self::ImportFormat { .. })
    }
}

/// Why a stored value could not be read as a flight list.
///
/// Decode failures never escape recovery; a slot that fails to decode is
/// treated as absent.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The value is not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The value is an object without a `flights` array.
    #[error("object has no flights array")]
    MissingFlights,

    /// The value is valid JSON of a shape that cannot hold flights.
    #[error("unexpected {0} where flights were expected")]
    UnexpectedShape(&'static str),
}
