//! Error types for Turnkeeper
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Turnkeeper
#[derive(Debug, Error)]
pub enum TurnkeeperError {
    /// The state store cannot be reached (lock poisoned, database gone)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite index error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl TurnkeeperError {
    /// Whether this error means the store could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TurnkeeperError::StoreUnavailable(_))
    }
}

/// Result type alias for Turnkeeper operations
pub type Result<T> = std::result::Result<T, TurnkeeperError>;
