//! Error types for schema_clone

use thiserror::Error;

/// Result type for schema_clone operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema_clone
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unable to analyze schema: {0}")]
    SchemaAnalysisError(String),

    #[error("Invalid ignore pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid operation on {object}: {reason}")]
    InvalidOperation { object: String, reason: String },

    #[error("Unsupported feature for {object}: {reason}")]
    UnsupportedFeature { object: String, reason: String },

    #[error("Syntax error in generated statement for {object}: {reason}")]
    SyntaxError { object: String, reason: String },

    #[error("Clone operation not found: {0}")]
    OperationNotFound(String),

    #[error("Clone operation {id} cannot move from {from} to {to}")]
    InvalidStatusTransition { id: String, from: String, to: String },

    #[error("Security incident not found: {0}")]
    IncidentNotFound(String),

    #[error("Security incident {0} is already resolved")]
    IncidentAlreadyResolved(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Shorthand for an invalid-operation error on a named object
    pub fn invalid_operation(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an unsupported-feature error on a named object
    pub fn unsupported(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedFeature {
            object: object.into(),
            reason: reason.into(),
        }
    }
}

/// Convert Serde JSON errors to schema_clone errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert YAML errors to schema_clone errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to schema_clone errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(error: toml::ser::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}
