use crate::execution::executor::RunReport;
use connectors::error::AdapterError;
use thiserror::Error;

/// Top-level errors for a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse the configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// `source` or `destination` names a connection that is not defined.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// The run finished, but at least one table copy did not.
    #[error("{} of {} tables failed: {}", .0.failed().len(), .0.tables.len(), .0.failed().join(", "))]
    TablesFailed(RunReport),
}
