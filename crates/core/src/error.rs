//! Error types for agrisearch.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! text completion, retrieval, prompt and timeout failures.

use thiserror::Error;

/// Unified error type for agrisearch.
///
/// All fallible functions return `Result<T, AppError>`.
/// Only configuration errors are meant to abort a research run; the
/// pipeline absorbs every other variant into a degraded value.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text-completion provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Evidence retrieval errors (corpus, embeddings, web search)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// A collaborator call exceeded its deadline
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        AppError::Timeout {
            operation: operation.into(),
            seconds: duration.as_secs(),
        }
    }

    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout { .. })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
