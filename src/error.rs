//! Error types for fabric-ops

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Unsupported parameter combination or an input that cannot be acted on.
    /// Always raised before any remote mutation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The MSP configuration tree does not have the expected structure
    #[error("Malformed MSP: {0}")]
    MalformedMsp(String),

    /// An update would modify a field the console cannot change in place
    #[error("{field} cannot be changed from {old} to {new} for existing ordering service node")]
    IllegalChange {
        field: String,
        old: serde_json::Value,
        new: serde_json::Value,
    },

    /// The console rejected a request
    #[error("Console operation '{operation}' failed with status {status}: {message}")]
    RemoteOperation {
        operation: String,
        status: u16,
        message: String,
    },

    /// The component did not become ready in time
    #[error("Timed out after {seconds}s waiting for component {id} to start")]
    Timeout { id: String, seconds: u64 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Whether running the same reconciliation again could succeed without
    /// changing its input.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout { .. } => true,
            Error::RemoteOperation { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
