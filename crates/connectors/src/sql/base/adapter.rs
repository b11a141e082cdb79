use crate::sql::base::{
    error::{ConnectorError, DbError},
    metadata::column::ColumnMetadata,
    query::{dialect::Dialect, generator::QueryGenerator},
    requests::{ColumnDef, FetchRowsRequest, UpsertStatement},
};
use async_trait::async_trait;
use model::{core::value::Value, pagination::cursor::Watermark, records::row::RowData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    Memory,
    Other(String),
}

/// The statement-level surface of a relational store.
///
/// Every method runs as its own unit of work; nothing here spans more than
/// one statement.
#[async_trait]
pub trait SqlAdapter: Send + Sync {
    fn kind(&self) -> DatabaseKind;
    fn dialect(&self) -> &dyn Dialect;
    /// Schema the adapter reads and writes tables in.
    fn schema(&self) -> &str;

    // Lifecycle
    async fn connect(&self) -> Result<(), ConnectorError>;
    async fn close(&self) -> Result<(), DbError>;

    // Introspection
    async fn list_tables(&self) -> Result<Vec<String>, DbError>;
    /// Columns in ordinal order; empty for a table that does not exist.
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>, DbError>;

    // Reads
    async fn count(&self, table: &str, watermark: Option<&Watermark>) -> Result<u64, DbError>;
    /// `Value::Null` when the table is empty.
    async fn max(&self, table: &str, column: &str) -> Result<Value, DbError>;
    async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError>;

    // DDL
    async fn create_table(&self, table: &str) -> Result<(), DbError>;
    async fn drop_table(&self, table: &str) -> Result<(), DbError>;
    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError>;
    async fn widen_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError>;

    // Writes
    fn upsert_statement(
        &self,
        table: &str,
        columns: &[String],
        conflict_key: &str,
    ) -> UpsertStatement {
        QueryGenerator::new(self.dialect(), self.schema()).upsert(table, columns, conflict_key)
    }

    /// Executes `statement` with one value per listed column. Returns the
    /// number of affected rows.
    async fn upsert(&self, statement: &UpsertStatement, values: Vec<Value>) -> Result<u64, DbError>;
}
