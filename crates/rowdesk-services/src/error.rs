use rowdesk_core::{CellError, RowdeskError};
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Invalid value: {0}")]
    InvalidValue(#[from] CellError),

    #[error("No schema selected")]
    NoSchemaSelected,

    #[error("No table selected")]
    NoTableSelected,

    /// Rows of a table without a primary key cannot be identified for editing
    #[error("Table '{0}' has no primary key; editing is disabled")]
    NoPrimaryKey(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Row {index} is out of range ({len} rows loaded)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("Filter {index} is out of range ({len} filters)")]
    FilterOutOfRange { index: usize, len: usize },

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("An apply is already in progress")]
    ApplyInProgress,
}

impl ServiceError {
    /// Map a source failure encountered while fetching
    pub fn from_fetch(err: RowdeskError) -> Self {
        match err {
            RowdeskError::Connection(msg) => Self::ConnectionFailed(msg),
            other => Self::QueryFailed(other.to_string()),
        }
    }

    /// Map a source failure encountered while committing
    pub fn from_update(err: RowdeskError) -> Self {
        match err {
            RowdeskError::Connection(msg) => Self::ConnectionFailed(msg),
            RowdeskError::Update(msg) => Self::UpdateFailed(msg),
            other => Self::UpdateFailed(other.to_string()),
        }
    }
}
