//! Error types for the measles guidelines assistant.
//!
//! This module defines a unified error enum covering every failure category
//! of the answering pipeline: configuration, ingestion, index build/load,
//! generation, request validation and readiness.

use thiserror::Error;

/// Unified error type for the measles guidelines assistant.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid parameters, rejected before any work begins
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source file could not be read or parsed
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// The embedding index could not be built
    #[error("Index build error: {0}")]
    IndexBuild(String),

    /// A persisted index could not be loaded
    #[error("Index load error: {0}")]
    IndexLoad(String),

    /// The completion capability is unavailable or failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Invalid request input (empty question, empty batch)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Short machine-readable category name, used in batch results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Io(_) => "io",
            Self::Ingestion(_) => "ingestion",
            Self::IndexBuild(_) => "index_build",
            Self::IndexLoad(_) => "index_load",
            Self::Generation(_) => "generation",
            Self::Prompt(_) => "prompt",
            Self::Validation(_) => "validation",
            Self::Serialization(_) => "serialization",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::Validation("Question cannot be empty".to_string());
        assert_eq!(err.to_string(), "Validation error: Question cannot be empty");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "serialization");
    }
}
