//! Error types for Wardroom Gate.

use crate::identity::RegistryError;
use crate::provider::ProviderError;
use thiserror::Error;

/// Result type for Gate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Gate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Route manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] wardroom_rank::Error),

    /// Identity registry error
    #[error("Identity registry error: {0}")]
    Registry(#[from] RegistryError),

    /// External identity provider error
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
