//! Error types for rowdesk

use thiserror::Error;

/// Core error type reported by a [`RemoteTableSource`](crate::RemoteTableSource)
#[derive(Error, Debug)]
pub enum RowdeskError {
    /// The store could not be reached or refused authentication
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed filter, operator/type mismatch or invalid pagination
    #[error("Query error: {0}")]
    Query(String),

    /// A batch update failed at the transport or constraint level
    #[error("Update error: {0}")]
    Update(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl RowdeskError {
    /// Whether this failure means the store is unreachable
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result type alias for rowdesk operations
pub type Result<T> = std::result::Result<T, RowdeskError>;
