//! Error types for the advisor pipeline

use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("Stage {stage} missing required state field: {field}")]
    UnmetDependency {
        stage: &'static str,
        field: &'static str,
    },

    #[error("State error: {0}")]
    StateError(String),

    #[error("No generative backend available: {0}")]
    BackendUnavailable(String),

    #[error("Import error: {0}")]
    ImportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
