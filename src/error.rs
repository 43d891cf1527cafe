//! Error types for the widget query engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Data access error: {0}")]
    DataAccessError(String),

    #[error("Widget not found: {0}")]
    WidgetNotFound(String),

    #[error("Invalid widget configuration: {0}")]
    InvalidConfiguration(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
