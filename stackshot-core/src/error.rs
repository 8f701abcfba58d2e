/*!
Error types for the Stackshot core engine.
*/

use thiserror::Error;

use crate::cloud::Service;

/// Result type used throughout the Stackshot core.
pub type Result<T> = std::result::Result<T, StackshotError>;

/// Errors that can occur during backup and restore runs.
#[derive(Error, Debug)]
pub enum StackshotError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The emulator endpoint for a service could not be reached
    #[error("Unable to connect to {service} at the emulator endpoint: {reason}")]
    Connection { service: Service, reason: String },

    /// An emulator API call failed
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },

    /// A snapshot artifact expected by restore is not present
    #[error("Snapshot file not found: {0}")]
    MissingSnapshot(String),

    /// A response or persisted record lacks a field we need
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Snapshot storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Errors surfaced through the retry layer
    #[error(transparent)]
    Retry(#[from] stackshot_retry::RetryError),
}

impl StackshotError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(service: Service, reason: S) -> Self {
        Self::Connection {
            service,
            reason: reason.into(),
        }
    }

    /// Create a new service error
    pub fn service<S: Into<String>>(operation: &'static str, message: S) -> Self {
        Self::Service {
            operation,
            message: message.into(),
        }
    }

    /// Create a new invalid record error
    pub fn invalid_record<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// True when the failure means the service was never reached
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
