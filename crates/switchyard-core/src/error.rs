//! Unified error types for Switchyard Core.

use serde::Serialize;
use switchyard_types::{AccountError, ConfigError, RouterError};
use thiserror::Error;

use crate::modules::store::StoreError;

/// Main error type for Switchyard core operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Shared key-value store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Network request failed (HTTP client).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Account or credential operation failed.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// Request routing failed.
    #[error("{0}")]
    Router(#[from] RouterError),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for Switchyard core operations.
pub type AppResult<T> = Result<T, AppError>;
