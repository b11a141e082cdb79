use crate::{
    connector::WriteSummary,
    events::EventSink,
    sql::base::{
        adapter::SqlAdapter,
        error::DbError,
        requests::UpsertStatement,
        schema::registry::{SchemaChange, SchemaRegistry, TableSchema},
    },
};
use model::{
    core::{data_type::ColumnType, value::Value},
    records::row::RowData,
};
use std::collections::HashMap;
use tracing::debug;

/// Writes rows one upsert at a time, after evolving the table to fit them.
///
/// Each row's statement lists only the columns that row carries, so a field
/// one row omits is never overwritten because a sibling row supplied it.
pub struct UpsertWriter<'a, A: SqlAdapter + ?Sized> {
    adapter: &'a A,
    registry: &'a SchemaRegistry,
    events: &'a EventSink,
}

impl<'a, A: SqlAdapter + ?Sized> UpsertWriter<'a, A> {
    pub fn new(adapter: &'a A, registry: &'a SchemaRegistry, events: &'a EventSink) -> Self {
        Self {
            adapter,
            registry,
            events,
        }
    }

    pub async fn write(&self, table: &str, rows: &[RowData]) -> Result<WriteSummary, DbError> {
        let mut summary = WriteSummary::default();
        let mut schema = self.evolve(table, rows, &mut summary).await?;
        let mut statements: HashMap<Vec<String>, UpsertStatement> = HashMap::new();

        let mut idx = 0;
        let mut refreshed = false;
        while let Some(row) = rows.get(idx) {
            match self.write_row(table, &schema, &mut statements, row).await {
                Ok(written) => {
                    summary.rows_written += written;
                    idx += 1;
                    refreshed = false;
                }
                Err(err) if err.is_missing_relation() => {
                    // Dropped underneath us; the next write recreates it.
                    self.registry.forget(table).await;
                    break;
                }
                Err(err) if err.is_missing_column() && !refreshed => {
                    // The cached columns are stale: the table was dropped or
                    // altered by someone else since it was loaded.
                    debug!(table, "Reloading stale schema");
                    self.registry.forget(table).await;
                    schema = self.evolve(table, &rows[idx..], &mut summary).await?;
                    statements.clear();
                    refreshed = true;
                }
                Err(err) => return Err(err),
            }
        }

        if summary.rows_written > 0 {
            self.events
                .info(format!("wrote {} records to {table}", summary.rows_written));
        }

        Ok(summary)
    }

    async fn evolve(
        &self,
        table: &str,
        rows: &[RowData],
        summary: &mut WriteSummary,
    ) -> Result<TableSchema, DbError> {
        let evolution = self.registry.evolve(self.adapter, table, rows).await?;
        for change in &evolution.changes {
            let column = change.column().to_string();
            match change {
                SchemaChange::AddColumn(_) => summary.columns_added.push(column),
                SchemaChange::Widen(_) => summary.columns_widened.push(column),
            }
        }
        Ok(evolution.schema)
    }

    /// Upserts one row. Returns the number of rows written, zero for a row
    /// with no known column.
    async fn write_row(
        &self,
        table: &str,
        schema: &TableSchema,
        statements: &mut HashMap<Vec<String>, UpsertStatement>,
        row: &RowData,
    ) -> Result<usize, DbError> {
        let columns: Vec<String> = schema
            .column_names()
            .into_iter()
            .filter(|c| row.contains(c))
            .collect();
        if columns.is_empty() {
            return Ok(0);
        }

        let values = columns
            .iter()
            .map(|column| coerce(schema, column, row.get_value(column)))
            .collect::<Result<Vec<_>, _>>()?;

        let statement = statements.entry(columns).or_insert_with_key(|columns| {
            self.adapter
                .upsert_statement(table, columns, self.registry.primary_key())
        });

        self.adapter.upsert(statement, values).await?;
        Ok(1)
    }
}

fn coerce(schema: &TableSchema, column: &str, value: Value) -> Result<Value, DbError> {
    let column_type = schema.column_type(column).unwrap_or(ColumnType::Text);
    value.coerce_to(column_type).ok_or_else(|| DbError::Coercion {
        table: schema.table.clone(),
        column: column.to_string(),
        column_type,
        value: value.to_string(),
    })
}
