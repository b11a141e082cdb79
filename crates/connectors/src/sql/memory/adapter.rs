use crate::sql::base::{
    adapter::{DatabaseKind, SqlAdapter},
    error::{ConnectorError, DbError},
    metadata::column::ColumnMetadata,
    query::{
        dialect::{Dialect, Postgres},
        generator::QueryGenerator,
    },
    requests::{ColumnDef, FetchRowsRequest, UpsertStatement},
};
use async_trait::async_trait;
use model::{
    core::{data_type::ColumnType, value::Value},
    pagination::cursor::Watermark,
    records::row::{FieldValue, RowData},
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Clone)]
struct MemoryColumn {
    name: String,
    column_type: ColumnType,
    primary_key: bool,
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<MemoryColumn>,
    rows: Vec<HashMap<String, Value>>,
}

impl MemoryTable {
    fn column(&self, name: &str) -> Option<&MemoryColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
    }

    fn matches(row: &HashMap<String, Value>, watermark: Option<&Watermark>) -> bool {
        match watermark {
            None => true,
            Some(wm) => row
                .get(&wm.column)
                .and_then(|v| v.compare(&wm.value))
                .is_some_and(|ord| ord != Ordering::Less),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    tables: BTreeMap<String, MemoryTable>,
    statements: Vec<String>,
    failing: HashSet<String>,
}

/// A relational store held in process memory.
///
/// Behaves like a Postgres schema as far as the sync engine can tell:
/// typed columns, primary-key conflicts, missing-relation errors and
/// in-place INTEGER to FLOAT widening. Clones share the same store, and every
/// statement it executes is recorded in its rendered SQL form.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    state: Arc<Mutex<MemoryState>>,
    dialect: Postgres,
    schema: String,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        MemoryAdapter::new("public")
    }
}

impl MemoryAdapter {
    pub fn new(schema: &str) -> Self {
        MemoryAdapter {
            state: Arc::new(Mutex::new(MemoryState::default())),
            dialect: Postgres,
            schema: schema.to_string(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generator(&self) -> QueryGenerator<'_> {
        QueryGenerator::new(&self.dialect, &self.schema)
    }

    /// Locks the store for an operation on `table`, recording `sql`.
    fn begin(&self, table: &str, sql: String) -> Result<MutexGuard<'_, MemoryState>, DbError> {
        let mut state = self.state();
        if !state.connected {
            return Err(DbError::NotConnected);
        }
        if state.failing.contains(table) {
            return Err(DbError::Write(format!("simulated failure on \"{table}\"")));
        }
        state.statements.push(sql);
        Ok(state)
    }

    /// Every statement executed so far, oldest first.
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    pub fn clear_statements(&self) {
        self.state().statements.clear();
    }

    /// Makes every following statement against `table` fail.
    pub fn inject_failure(&self, table: &str) {
        self.state().failing.insert(table.to_string());
    }

    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    /// Current contents of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<RowData> {
        let state = self.state();
        match state.tables.get(table) {
            Some(t) => t.rows.iter().map(|r| to_row_data(table, t, r)).collect(),
            None => Vec::new(),
        }
    }

    pub fn column_type(&self, table: &str, column: &str) -> Option<ColumnType> {
        let state = self.state();
        state
            .tables
            .get(table)
            .and_then(|t| t.column(column))
            .map(|c| c.column_type)
    }
}

fn to_row_data(table: &str, t: &MemoryTable, row: &HashMap<String, Value>) -> RowData {
    let fields = t
        .columns
        .iter()
        .map(|c| FieldValue {
            name: c.name.clone(),
            value: row.get(&c.name).cloned().unwrap_or(Value::Null),
        })
        .collect();
    RowData::new(table, fields)
}

fn missing(table: &str) -> DbError {
    DbError::MissingRelation(table.to_string())
}

#[async_trait]
impl SqlAdapter for MemoryAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Memory
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        self.state().connected = true;
        Ok(())
    }

    async fn close(&self) -> Result<(), DbError> {
        self.state().connected = false;
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let state = self.state();
        if !state.connected {
            return Err(DbError::NotConnected);
        }
        Ok(state.tables.keys().cloned().collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>, DbError> {
        let state = self.state();
        if !state.connected {
            return Err(DbError::NotConnected);
        }
        let Some(t) = state.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(t.columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut meta = ColumnMetadata::new(
                    &c.name,
                    &c.column_type.postgres_name().to_lowercase(),
                    i + 1,
                );
                meta.is_nullable = !c.primary_key;
                meta
            })
            .collect())
    }

    async fn count(&self, table: &str, watermark: Option<&Watermark>) -> Result<u64, DbError> {
        let (sql, _) = self.generator().count(table, watermark);
        let state = self.begin(table, sql)?;
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        if let Some(wm) = watermark
            && t.column(&wm.column).is_none()
        {
            return Err(DbError::MissingColumn {
                table: table.to_string(),
                column: wm.column.clone(),
            });
        }
        Ok(t.rows
            .iter()
            .filter(|r| MemoryTable::matches(r, watermark))
            .count() as u64)
    }

    async fn max(&self, table: &str, column: &str) -> Result<Value, DbError> {
        let sql = self.generator().max(table, column);
        let state = self.begin(table, sql)?;
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        if t.column(column).is_none() {
            return Err(DbError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        let max = t
            .rows
            .iter()
            .filter_map(|r| r.get(column))
            .filter(|v| !v.is_null())
            .fold(None::<&Value>, |best, v| match best {
                Some(b) if b.compare(v) != Some(Ordering::Less) => Some(b),
                _ => Some(v),
            });
        Ok(max.cloned().unwrap_or(Value::Null))
    }

    async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        let (sql, _) = self.generator().select(request);
        let state = self.begin(&request.table, sql)?;
        let t = state
            .tables
            .get(&request.table)
            .ok_or_else(|| missing(&request.table))?;

        let mut rows: Vec<&HashMap<String, Value>> = t
            .rows
            .iter()
            .filter(|r| MemoryTable::matches(r, request.watermark.as_ref()))
            .collect();

        if let Some(order_by) = &request.order_by {
            rows.sort_by(|a, b| match (a.get(order_by), b.get(order_by)) {
                (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });
        }

        Ok(rows
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|r| to_row_data(&request.table, t, r))
            .collect())
    }

    async fn create_table(&self, table: &str) -> Result<(), DbError> {
        let sql = self.generator().create_table(table);
        let mut state = self.begin(table, sql)?;
        state.tables.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), DbError> {
        let sql = self.generator().drop_table(table);
        let mut state = self.begin(table, sql)?;
        state.tables.remove(table);
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError> {
        let sql = self.generator().add_column(table, column);
        let mut state = self.begin(table, sql)?;
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;

        if t.column(&column.name).is_some() {
            return Err(DbError::Write(format!(
                "column \"{}\" of relation \"{table}\" already exists",
                column.name
            )));
        }
        if column.primary_key && (t.primary_key().is_some() || !t.rows.is_empty()) {
            return Err(DbError::Write(format!(
                "cannot add primary key \"{}\" to \"{table}\"",
                column.name
            )));
        }

        t.columns.push(MemoryColumn {
            name: column.name.clone(),
            column_type: column.column_type,
            primary_key: column.primary_key,
        });
        Ok(())
    }

    async fn widen_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError> {
        let sql = self.generator().alter_column_type(table, column);
        let mut state = self.begin(table, sql)?;
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;

        let Some(existing) = t.columns.iter_mut().find(|c| c.name == column.name) else {
            return Err(DbError::MissingColumn {
                table: table.to_string(),
                column: column.name.clone(),
            });
        };
        existing.column_type = column.column_type;

        for row in t.rows.iter_mut() {
            if let Some(value) = row.get_mut(&column.name) {
                *value = value.coerce_to(column.column_type).unwrap_or(Value::Null);
            }
        }
        Ok(())
    }

    async fn upsert(&self, statement: &UpsertStatement, values: Vec<Value>) -> Result<u64, DbError> {
        let table = statement.table.as_str();
        let mut state = self.begin(table, statement.sql.clone())?;
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;

        if values.len() != statement.columns.len() {
            return Err(DbError::Write(format!(
                "statement binds {} values, {} given",
                statement.columns.len(),
                values.len()
            )));
        }

        let mut incoming = HashMap::with_capacity(values.len());
        for (name, value) in statement.columns.iter().zip(values) {
            let column = t.column(name).ok_or_else(|| DbError::MissingColumn {
                table: table.to_string(),
                column: name.clone(),
            })?;
            let stored = value
                .coerce_to(column.column_type)
                .ok_or_else(|| DbError::Coercion {
                    table: table.to_string(),
                    column: name.clone(),
                    column_type: column.column_type,
                    value: value.to_string(),
                })?;
            incoming.insert(name.clone(), stored);
        }

        let Some(pk) = t.primary_key().map(str::to_string) else {
            return Err(DbError::Write(format!(
                "there is no unique or exclusion constraint on \"{table}\" matching the ON CONFLICT specification"
            )));
        };

        let key = incoming.get(&pk).cloned().unwrap_or(Value::Null);
        if key.is_null() {
            return Err(DbError::Write(format!(
                "null value in column \"{pk}\" of relation \"{table}\" violates not-null constraint"
            )));
        }

        match t.rows.iter_mut().find(|r| r.get(&pk) == Some(&key)) {
            Some(existing) => existing.extend(incoming),
            None => t.rows.push(incoming),
        }
        Ok(1)
    }
}
