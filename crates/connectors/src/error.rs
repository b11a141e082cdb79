use crate::{
    file::csv::error::FileError,
    sql::base::error::{ConnectorError, DbError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// No connector is registered under the requested type name.
    #[error("Unsupported connector type: {0}")]
    UnsupportedConnector(String),

    /// Failed to initialize a data connector/adapter.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// File-related error.
    #[error("File error: {0}")]
    FileError(#[from] FileError),

    /// Database-related error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// A batch handler rejected a batch.
    #[error("Batch handler failed: {0}")]
    Handler(String),
}

impl AdapterError {
    pub fn is_missing_relation(&self) -> bool {
        match self {
            AdapterError::Database(err) => err.is_missing_relation(),
            AdapterError::FileError(FileError::NotFound(_)) => true,
            _ => false,
        }
    }
}
