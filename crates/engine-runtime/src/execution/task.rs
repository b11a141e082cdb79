use connectors::{
    connector::{Connector, ReadOptions},
    error::AdapterError,
};
use model::core::value::Value;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// One table copy. Tasks never share mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTask {
    pub source_table: String,
    pub destination_table: String,
    pub mode: SyncMode,
    /// Column and value rows must reach to be copied in incremental mode.
    pub watermark: Option<(String, Value)>,
}

impl SyncTask {
    pub fn full(source_table: &str, destination_table: &str) -> Self {
        SyncTask {
            source_table: source_table.to_string(),
            destination_table: destination_table.to_string(),
            mode: SyncMode::Full,
            watermark: None,
        }
    }

    /// Picks the mode for copying into `destination_table`.
    ///
    /// The first of `update_columns` the destination carries with a non-null
    /// maximum makes the copy incremental from that maximum. A missing table
    /// or column falls through to a full copy.
    pub async fn plan(
        destination: &dyn Connector,
        source_table: &str,
        destination_table: &str,
        update_columns: &[String],
    ) -> Result<Self, AdapterError> {
        let mut task = SyncTask::full(source_table, destination_table);

        let columns = destination.list_columns(destination_table).await?;
        for column in update_columns.iter().filter(|c| columns.contains(c)) {
            if let Some(max) = destination.max(destination_table, column).await? {
                task.mode = SyncMode::Incremental;
                task.watermark = Some((column.clone(), max));
                break;
            }
        }

        Ok(task)
    }

    pub fn read_options(&self) -> ReadOptions {
        match &self.watermark {
            Some((column, value)) => ReadOptions::since(column, value.clone()),
            None => ReadOptions::default(),
        }
    }
}
