use crate::sql::base::{
    adapter::SqlAdapter,
    error::DbError,
    metadata::column::{ColumnMetadata, order_column_names},
    requests::ColumnDef,
    schema::inference::{infer_column_type, needs_float},
};
use model::{
    core::data_type::ColumnType,
    records::{batch::union_keys, row::RowData},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Known columns of one destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table: String,
    pub primary_key: String,
    columns: HashMap<String, ColumnType>,
}

impl TableSchema {
    pub fn new(table: &str, primary_key: &str) -> Self {
        TableSchema {
            table: table.to_string(),
            primary_key: primary_key.to_string(),
            columns: HashMap::new(),
        }
    }

    pub fn from_metadata(table: &str, primary_key: &str, columns: &[ColumnMetadata]) -> Self {
        let mut schema = TableSchema::new(table, primary_key);
        for column in columns {
            schema.columns.insert(column.name.clone(), column.storage_type());
        }
        schema
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    /// Primary key first, then lexical order.
    pub fn column_names(&self) -> Vec<String> {
        order_column_names(self.columns.keys().cloned(), &self.primary_key)
    }

    fn apply(&mut self, change: &SchemaChange) {
        match change {
            SchemaChange::AddColumn(def) | SchemaChange::Widen(def) => {
                self.columns.insert(def.name.clone(), def.column_type);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    AddColumn(ColumnDef),
    Widen(ColumnDef),
}

impl SchemaChange {
    pub fn column(&self) -> &str {
        match self {
            SchemaChange::AddColumn(def) | SchemaChange::Widen(def) => &def.name,
        }
    }
}

/// The DDL needed before `rows` can be written into a table shaped like `schema`.
pub fn plan_changes(schema: &TableSchema, rows: &[RowData]) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    for key in union_keys(rows) {
        let samples = rows.iter().filter_map(|row| row.get(&key));

        match schema.column_type(&key) {
            None => {
                if let Some(column_type) = infer_column_type(samples) {
                    let primary_key = key == schema.primary_key;
                    changes.push(SchemaChange::AddColumn(ColumnDef::new(
                        &key,
                        column_type,
                        primary_key,
                    )));
                }
            }
            Some(current) if current.widens_to(ColumnType::Float) => {
                if needs_float(samples) {
                    changes.push(SchemaChange::Widen(ColumnDef::new(
                        &key,
                        ColumnType::Float,
                        false,
                    )));
                }
            }
            Some(_) => {}
        }
    }

    changes
}

#[derive(Debug, Clone)]
pub struct Evolution {
    pub schema: TableSchema,
    pub changes: Vec<SchemaChange>,
}

/// Per-connector cache of destination table schemas. Each table is evolved
/// under its own lock so concurrent writers to different tables never wait
/// on each other.
#[derive(Debug)]
pub struct SchemaRegistry {
    primary_key: String,
    tables: RwLock<HashMap<String, Arc<Mutex<Option<TableSchema>>>>>,
}

impl SchemaRegistry {
    pub fn new(primary_key: &str) -> Self {
        SchemaRegistry {
            primary_key: primary_key.to_string(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    async fn slot(&self, table: &str) -> Arc<Mutex<Option<TableSchema>>> {
        if let Some(slot) = self.tables.read().await.get(table) {
            return slot.clone();
        }
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .clone()
    }

    /// Drops the cached schema so the next write reloads it from the store.
    pub async fn forget(&self, table: &str) {
        self.tables.write().await.remove(table);
    }

    async fn load<A: SqlAdapter + ?Sized>(
        &self,
        adapter: &A,
        table: &str,
    ) -> Result<TableSchema, DbError> {
        let columns = adapter.table_columns(table).await?;
        Ok(TableSchema::from_metadata(table, &self.primary_key, &columns))
    }

    /// Makes sure `table` exists and can hold every key of `rows`, issuing
    /// the DDL that is missing.
    pub async fn evolve<A: SqlAdapter + ?Sized>(
        &self,
        adapter: &A,
        table: &str,
        rows: &[RowData],
    ) -> Result<Evolution, DbError> {
        adapter.create_table(table).await?;

        let slot = self.slot(table).await;
        let mut cached = slot.lock().await;

        let mut schema = match cached.take() {
            Some(schema) => {
                // Another process may have evolved the table since it was cached.
                if plan_changes(&schema, rows).is_empty() {
                    schema
                } else {
                    self.load(adapter, table).await?
                }
            }
            None => self.load(adapter, table).await?,
        };

        let changes = plan_changes(&schema, rows);
        for change in &changes {
            match change {
                SchemaChange::AddColumn(def) => {
                    debug!(table, column = %def.name, column_type = %def.column_type, "Adding column");
                    adapter.add_column(table, def).await?;
                }
                SchemaChange::Widen(def) => {
                    debug!(table, column = %def.name, "Widening column to FLOAT");
                    adapter.widen_column(table, def).await?;
                }
            }
            schema.apply(change);
        }

        *cached = Some(schema.clone());
        Ok(Evolution { schema, changes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    fn row(pairs: Vec<(&str, Value)>) -> RowData {
        RowData::from_pairs("fish", pairs)
    }

    #[test]
    fn test_plan_adds_unknown_columns_with_primary_key() {
        let schema = TableSchema::new("fish", "id");
        let rows = vec![
            row(vec![("id", Value::Int(1)), ("name", Value::from("toby"))]),
            row(vec![("id", Value::Int(2)), ("weight", Value::Null)]),
        ];

        let changes = plan_changes(&schema, &rows);
        assert_eq!(
            changes,
            vec![
                SchemaChange::AddColumn(ColumnDef::new("id", ColumnType::Integer, true)),
                SchemaChange::AddColumn(ColumnDef::new("name", ColumnType::Text, false)),
            ]
        );
    }

    #[test]
    fn test_plan_widens_integer_for_fractional_sample() {
        let mut schema = TableSchema::new("fish", "id");
        schema.apply(&SchemaChange::AddColumn(ColumnDef::new("id", ColumnType::Integer, true)));
        schema.apply(&SchemaChange::AddColumn(ColumnDef::new(
            "weight",
            ColumnType::Integer,
            false,
        )));

        let rows = vec![row(vec![("id", Value::Int(4)), ("weight", Value::Float(10.01))])];
        assert_eq!(
            plan_changes(&schema, &rows),
            vec![SchemaChange::Widen(ColumnDef::new("weight", ColumnType::Float, false))]
        );

        let whole = vec![row(vec![("id", Value::Int(4)), ("weight", Value::Int(10))])];
        assert!(plan_changes(&schema, &whole).is_empty());
    }

    #[test]
    fn test_text_column_never_changes_type() {
        let mut schema = TableSchema::new("fish", "id");
        schema.apply(&SchemaChange::AddColumn(ColumnDef::new("name", ColumnType::Text, false)));
        let rows = vec![row(vec![("name", Value::Float(1.5))])];
        assert!(plan_changes(&schema, &rows).is_empty());
    }

    #[test]
    fn test_column_names_order() {
        let mut schema = TableSchema::new("fish", "id");
        for name in ["weight", "id", "color"] {
            schema.apply(&SchemaChange::AddColumn(ColumnDef::new(
                name,
                ColumnType::Text,
                name == "id",
            )));
        }
        assert_eq!(schema.column_names(), vec!["id", "color", "weight"]);
    }
}
