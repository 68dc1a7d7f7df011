use thiserror::Error;

/// Top-level error type for the Engage system.
///
/// Subsystem crates define their own error types and implement
/// `From<EngageError>` (or the reverse) so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for EngageError {
    fn from(err: toml::de::Error) -> Self {
        EngageError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EngageError {
    fn from(err: toml::ser::Error) -> Self {
        EngageError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for EngageError {
    fn from(err: serde_json::Error) -> Self {
        EngageError::Serialization(err.to_string())
    }
}

/// Convenience alias used throughout the Engage crates.
pub type Result<T> = std::result::Result<T, EngageError>;
