use crate::{
    error::AdapterError, settings::DEFAULT_WATERMARK_COLUMN,
    sql::base::metadata::column::ColumnMetadata,
};
use async_trait::async_trait;
use model::{
    core::value::Value,
    pagination::cursor::Watermark,
    records::{batch::RowBatch, row::RowData},
};

/// Receives the windows of a read, one at a time. The reader awaits each
/// call before fetching the next window.
#[async_trait]
pub trait BatchHandler: Send {
    async fn handle(&mut self, batch: RowBatch) -> Result<(), AdapterError>;
}

/// Keeps every batch it is handed.
#[derive(Debug, Default)]
pub struct BatchCollector {
    pub batches: Vec<RowBatch>,
}

impl BatchCollector {
    pub fn rows(&self) -> Vec<RowData> {
        self.batches
            .iter()
            .flat_map(|batch| batch.rows().iter().cloned())
            .collect()
    }
}

#[async_trait]
impl BatchHandler for BatchCollector {
    async fn handle(&mut self, batch: RowBatch) -> Result<(), AdapterError> {
        self.batches.push(batch);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Lower bound for incremental reads; ignored when the table lacks
    /// `watermark_column`.
    pub since: Option<Value>,
    pub watermark_column: String,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            since: None,
            watermark_column: DEFAULT_WATERMARK_COLUMN.to_string(),
        }
    }
}

impl ReadOptions {
    pub fn since(column: &str, value: Value) -> Self {
        ReadOptions {
            since: Some(value),
            watermark_column: column.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub rows: usize,
    /// Handler calls, the terminal empty window included.
    pub batches: usize,
    pub incremental: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows_written: usize,
    pub columns_added: Vec<String>,
    pub columns_widened: Vec<String>,
}

/// The capability set every store variant offers the sync engine.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<(), AdapterError>;
    async fn disconnect(&self) -> Result<(), AdapterError>;

    /// Tables seen by the last `connect`.
    fn tables(&self) -> Vec<String>;

    async fn list_tables(&self) -> Result<Vec<String>, AdapterError>;
    /// Column names, primary key first, then lexical.
    async fn list_columns(&self, table: &str) -> Result<Vec<String>, AdapterError>;
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnMetadata>, AdapterError>;

    /// Rows in `table`, restricted to `since` when given. Zero for a missing table.
    async fn count(&self, table: &str, since: Option<&Watermark>) -> Result<u64, AdapterError>;
    /// Largest value of `column`; `None` when the table or column is missing or empty.
    async fn max(&self, table: &str, column: &str) -> Result<Option<Value>, AdapterError>;

    async fn read(
        &self,
        table: &str,
        handler: &mut dyn BatchHandler,
        options: &ReadOptions,
    ) -> Result<ReadSummary, AdapterError>;
    async fn write(&self, table: &str, rows: &[RowData]) -> Result<WriteSummary, AdapterError>;

    async fn ensure_table(&self, table: &str) -> Result<(), AdapterError>;
    /// Removes `table`; a missing table is not an error.
    async fn drop_table(&self, table: &str) -> Result<(), AdapterError>;
}
