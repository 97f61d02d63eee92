use thiserror::Error;

/// Main error type for chatnoir-retrieve
#[derive(Error, Debug)]
pub enum RetrieveError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Input is not a table, or not a usable one
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input table lacks required columns
    #[error("Input is missing required columns: {missing:?}")]
    MissingColumns { missing: Vec<String> },

    /// A single-query transform received rows for several queries
    #[error("Can only transform one query at a time, got query ids {qids:?}")]
    MultipleQueries { qids: Vec<String> },

    /// HTTP transport errors
    #[error("HTTP error: {context}: {source}")]
    Http {
        source: reqwest::Error,
        context: String,
    },

    /// Non-success response from the search service
    #[error("Search API returned status {status}: {body}")]
    Api { status: u16, body: String },

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

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RetrieveError {
    /// Whether this error is about the shape of the caller's input
    pub fn is_input_shape(&self) -> bool {
        matches!(
            self,
            RetrieveError::InvalidInput(_)
                | RetrieveError::MissingColumns { .. }
                | RetrieveError::MultipleQueries { .. }
        )
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

/// Result type for chatnoir-retrieve operations
pub type Result<T> = std::result::Result<T, RetrieveError>;
