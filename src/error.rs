use crate::embedding::{EmbeddingError, VectorIndexError};
use crate::splitter::SplitterError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bookrag
#[derive(Error, Debug)]
pub enum RagError {
    /// Source document missing at ingestion time
    #[error("The file {} does not exist. Please check the path.", path.display())]
    DocumentNotFound { path: PathBuf },

    /// Persistent store missing at retrieval time
    #[error("Vector store not found at {}. Run `bookrag ingest` first.", path.display())]
    StoreNotFound { path: PathBuf },

    /// Refusing to create a store over an existing directory
    #[error("Vector store already exists at {}", path.display())]
    StoreExists { path: PathBuf },

    /// Store directory exists but its contents cannot be used
    #[error("Vector store at {} is unusable: {message}", path.display())]
    CorruptStore { path: PathBuf, message: String },

    /// Rejected query input
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Neighbor index errors
    #[error("Vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    /// Splitter configuration errors
    #[error("Splitter error: {0}")]
    Splitter(#[from] SplitterError),
}

impl RagError {
    /// Wrap an IO error with a description of what was being attempted
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for bookrag operations
pub type Result<T> = std::result::Result<T, RagError>;
