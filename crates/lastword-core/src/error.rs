// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lastword delivery engine.

use thiserror::Error;

/// The primary error type used across all Lastword adapter traits and engine operations.
#[derive(Debug, Error)]
pub enum LastwordError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (SMTP rejection, HTTP failure, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A record required to process a request does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A final delivery was requested but the condition lists nobody to send to.
    #[error("no recipients configured for condition {condition_id}")]
    NoRecipients { condition_id: String },

    /// A request was rejected because of its content (bad threshold, unknown kind).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LastwordError {
    /// Shorthand for a storage error wrapping any error type.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LastwordError::Storage {
            source: Box::new(err),
        }
    }

    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        LastwordError::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the same operation later could succeed.
    ///
    /// Missing data and missing recipients cannot be fixed by a retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LastwordError::Storage { .. }
                | LastwordError::Channel { .. }
                | LastwordError::Timeout { .. }
        )
    }

    /// Short machine-readable tag written to the delivery log.
    pub fn tag(&self) -> &'static str {
        match self {
            LastwordError::Config(_) => "config",
            LastwordError::Storage { .. } => "storage",
            LastwordError::Channel { .. } => "channel",
            LastwordError::NotFound { .. } => "not_found",
            LastwordError::NoRecipients { .. } => "no_recipients",
            LastwordError::InvalidInput(_) => "invalid_input",
            LastwordError::Timeout { .. } => "timeout",
            LastwordError::Internal(_) => "internal",
        }
    }
}
