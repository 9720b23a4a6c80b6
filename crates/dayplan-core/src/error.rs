//! Core error types for dayplan-core.
//!
//! This module defines the error hierarchy using thiserror. Store errors
//! are kept separate from the top-level [`CoreError`] because the
//! scheduler classifies them per phase: a failed read aborts a run, a
//! failed write only fails the item being written.

use std::path::PathBuf;
use thiserror::Error;

use crate::schedule::SourceType;

/// Core error type for dayplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by a [`ScheduleStore`](crate::storage::ScheduleStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Query or command execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// The store does not yet accept instances of this source type.
    ///
    /// Raised by stores whose schema predates habit placements.
    #[error("schedule_instance_source_type does not accept {source_type}")]
    UnsupportedSourceType { source_type: SourceType },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A row could not be decoded into a typed record
    #[error("Failed to decode '{field}': {message}")]
    Decode { field: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

impl StoreError {
    /// Stable short code used in progress events and failure details.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Query(_) => "query",
            StoreError::UnsupportedSourceType { .. } => "unsupported_source_type",
            StoreError::NotFound(_) => "not_found",
            StoreError::Decode { .. } => "decode",
            StoreError::Locked => "locked",
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown IANA time zone
    #[error("Unknown time zone: {0}")]
    InvalidTimeZone(String),

    /// Malformed local time of day
    #[error("Invalid local time '{0}', expected HH:MM")]
    InvalidTime(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let message = msg.clone().unwrap_or_else(|| err.to_string());
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else if code.code == rusqlite::ErrorCode::ConstraintViolation
                    && message.contains("source_type")
                {
                    StoreError::UnsupportedSourceType {
                        source_type: SourceType::Habit,
                    }
                } else {
                    StoreError::Query(message)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}
