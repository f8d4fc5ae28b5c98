//! Error types for Citeflow.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! LLM, prompt and retrieval-pipeline failures.

use thiserror::Error;

/// Unified error type for Citeflow.
///
/// All fallible functions return `Result<T, AppError>`. Pipeline errors are
/// logged with request context by the caller that observes them and then
/// propagated unchanged; nothing in the core retries.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Source profile and template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// The conversation holds no user-role message to derive a query from
    #[error("No user message found in conversation")]
    NoUserMessage,

    /// The requested document source is not among the available sources
    #[error("Document source not found: {0}")]
    SourceNotFound(String),

    /// The document index failed while searching
    #[error("Search failed for source '{source_id}': {cause}")]
    SearchFailed {
        source_id: String,
        #[source]
        cause: Box<AppError>,
    },

    /// Query reformulation failed; callers fall back to the raw query
    #[error("Query reformulation failed: {0}")]
    ReformulationFailed(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Wrap an index failure for the given source.
    pub fn search_failed(source_id: impl Into<String>, cause: AppError) -> Self {
        AppError::SearchFailed {
            source_id: source_id.into(),
            cause: Box::new(cause),
        }
    }

    /// Short machine-readable code, used in logs and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Llm(_) => "llm",
            AppError::Prompt(_) => "prompt",
            AppError::NoUserMessage => "no_user_message",
            AppError::SourceNotFound(_) => "source_not_found",
            AppError::SearchFailed { .. } => "search_failed",
            AppError::ReformulationFailed(_) => "reformulation_failed",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
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
