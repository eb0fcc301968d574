//! Error types for the address agent.
//!
//! This module provides the error hierarchy for every stage of address
//! handling: configuration, resource store access, address parsing and
//! mutation, and plan catalog queries.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the address agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Resource store errors.
    #[error("Resource store error: {0}")]
    Store(#[from] StoreError),

    /// Address parsing and mutation errors.
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// Plan catalog errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Resource store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Authentication against the store failed.
    #[error("Resource store authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The store answered with an unexpected status.
    #[error("Resource store request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the store.
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("Resource not found: {path}")]
    NotFound {
        /// Path of the missing resource.
        path: String,
    },

    /// A write lost an optimistic concurrency race.
    #[error("Conflicting write to {path}")]
    Conflict {
        /// Path of the contended resource.
        path: String,
    },

    /// Rate limited.
    #[error("Resource store rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with resource store: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response body.
    #[error("Invalid response from resource store: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Address parsing and mutation errors.
#[derive(Debug, Error)]
pub enum AddressError {
    /// A stored resource does not carry a usable address payload.
    #[error("Failed to parse address resource '{resource}': {message}")]
    Parse {
        /// Name of the offending resource.
        resource: String,
        /// Description of the parse failure.
        message: String,
    },

    /// The store rejected a new address.
    #[error("Failed to create address: {status} {message}")]
    Create {
        /// Status code returned by the store.
        status: u16,
        /// Description of the rejection.
        message: String,
    },

    /// The store rejected an address deletion.
    #[error("Failed to delete address: {status} {message}")]
    Delete {
        /// Status code returned by the store.
        status: u16,
        /// Description of the rejection.
        message: String,
    },

    /// A status write for an address failed.
    #[error("Failed to update status for {address}: {message}")]
    Update {
        /// The address whose status could not be written.
        address: String,
        /// Description of the failure.
        message: String,
    },
}

/// Plan catalog errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A referenced plan does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of plan that was looked up.
        kind: String,
        /// Name that was looked up.
        name: String,
    },
}

/// Result type alias for address agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::RateLimited { .. } | StoreError::NetworkError { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Store(StoreError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Store(StoreError::NetworkError { .. }) => Some(1),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StoreError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

impl AddressError {
    /// Creates a parse error for the named resource.
    #[must_use]
    pub fn parse(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Returns the canonical reason phrase for an HTTP-like status code.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status")
}
