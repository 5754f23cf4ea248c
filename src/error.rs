//! Error types for dblink.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for dblink operations.
#[derive(Error, Debug)]
pub enum DbLinkError {
    /// A connection could not be acquired from the pool within the timeout
    /// (pool exhaustion, host unreachable, auth failed, etc.)
    #[error("Pool acquisition error: {0}")]
    PoolAcquisition(String),

    /// Statement preparation, parameter binding, or execution failed.
    /// Carries the offending SQL text alongside the driver message.
    #[error("Execution error for `{sql}`: {message}")]
    Execution { sql: String, message: String },

    /// Result-set metadata could not be introspected after execution.
    #[error("Metadata extraction error: {0}")]
    MetadataExtraction(String),

    /// Closing the cursor or statement failed during cleanup.
    #[error("Resource release error: {0}")]
    ResourceRelease(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbLinkError {
    /// Creates a pool acquisition error with the given message.
    pub fn pool_acquisition(msg: impl Into<String>) -> Self {
        Self::PoolAcquisition(msg.into())
    }

    /// Creates an execution error for the given SQL text.
    pub fn execution(sql: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Execution {
            sql: sql.into(),
            message: msg.into(),
        }
    }

    /// Creates a metadata extraction error with the given message.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::MetadataExtraction(msg.into())
    }

    /// Creates a resource release error with the given message.
    pub fn release(msg: impl Into<String>) -> Self {
        Self::ResourceRelease(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::PoolAcquisition(_) => "Pool Acquisition Error",
            Self::Execution { .. } => "Execution Error",
            Self::MetadataExtraction(_) => "Metadata Extraction Error",
            Self::ResourceRelease(_) => "Resource Release Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using DbLinkError.
pub type Result<T> = std::result::Result<T, DbLinkError>;
