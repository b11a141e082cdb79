use crate::{
    events::EventSink,
    settings::ConnectorSettings,
    sql::{
        base::{
            adapter::{DatabaseKind, SqlAdapter},
            error::{ConnectorError, DbError},
            metadata::column::ColumnMetadata,
            query::{
                dialect::{self, Dialect},
                generator::{COUNT_ALIAS, QueryGenerator},
            },
            requests::{ColumnDef, FetchRowsRequest, UpsertStatement},
        },
        postgres::{
            params::PgParamStore,
            row::{column_value, to_row_data},
            utils::connect_client,
        },
    },
};
use async_trait::async_trait;
use model::{core::value::Value, pagination::cursor::Watermark, records::row::RowData};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio_postgres::{Client, Row};
use tracing::{debug, warn};

const QUERY_LIST_TABLES_SQL: &str = include_str!("sql/list_tables.sql");
const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");

/// A fixed set of clients handed out round-robin.
struct PgPool {
    clients: Vec<Mutex<Client>>,
    next: AtomicUsize,
}

impl PgPool {
    async fn acquire(&self) -> MutexGuard<'_, Client> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients[idx].lock().await
    }
}

pub struct PgAdapter {
    url: String,
    schema: String,
    pool_size: usize,
    dialect: dialect::Postgres,
    events: EventSink,
    pool: RwLock<Option<Arc<PgPool>>>,
}

impl PgAdapter {
    pub fn new(url: &str, settings: &ConnectorSettings, events: EventSink) -> Self {
        PgAdapter {
            url: url.to_string(),
            schema: settings.schema.clone(),
            pool_size: settings.pool_size.max(1),
            dialect: dialect::Postgres,
            events,
            pool: RwLock::new(None),
        }
    }

    fn generator(&self) -> QueryGenerator<'_> {
        QueryGenerator::new(&self.dialect, &self.schema)
    }

    async fn pool(&self) -> Result<Arc<PgPool>, DbError> {
        self.pool.read().await.clone().ok_or(DbError::NotConnected)
    }

    /// Runs one statement inside its own BEGIN/COMMIT, rolling back on error.
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DbError> {
        let pool = self.pool().await?;
        let mut client = pool.acquire().await;
        let tx = client.transaction().await?;
        let bindings = PgParamStore::from_values(params);

        match tx.execute(sql, &bindings.as_refs()).await {
            Ok(affected) => {
                tx.commit().await?;
                Ok(affected)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(%rollback, "Rollback failed");
                }
                Err(err.into())
            }
        }
    }

    /// Like [`Self::execute`], returning the rows.
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, DbError> {
        let pool = self.pool().await?;
        let mut client = pool.acquire().await;
        let tx = client.transaction().await?;
        let bindings = PgParamStore::from_values(params);

        match tx.query(sql, &bindings.as_refs()).await {
            Ok(rows) => {
                tx.commit().await?;
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(%rollback, "Rollback failed");
                }
                Err(err.into())
            }
        }
    }
}

#[async_trait]
impl SqlAdapter for PgAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        let mut pool = self.pool.write().await;
        if pool.is_some() {
            return Ok(());
        }

        let mut clients = Vec::with_capacity(self.pool_size);
        for _ in 0..self.pool_size {
            clients.push(Mutex::new(connect_client(&self.url, &self.events).await?));
        }
        debug!(clients = clients.len(), schema = %self.schema, "Connected to Postgres");

        *pool = Some(Arc::new(PgPool {
            clients,
            next: AtomicUsize::new(0),
        }));
        Ok(())
    }

    async fn close(&self) -> Result<(), DbError> {
        // Dropping the last client handle ends its connection task.
        self.pool.write().await.take();
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let rows = self
            .query(QUERY_LIST_TABLES_SQL, vec![Value::String(self.schema.clone())])
            .await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(DbError::from))
            .collect()
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>, DbError> {
        let params = vec![
            Value::String(self.schema.clone()),
            Value::String(table.to_string()),
        ];
        let rows = self.query(QUERY_TABLE_COLUMNS_SQL, params).await?;

        rows.iter()
            .map(|row| -> Result<ColumnMetadata, DbError> {
                let name: String = row.try_get("column_name")?;
                let data_type: String = row.try_get("data_type")?;
                let ordinal: i32 = row.try_get("ordinal_position")?;
                let mut column = ColumnMetadata::new(&name, &data_type, ordinal.max(0) as usize);
                column.is_nullable = row.try_get("is_nullable")?;
                column.char_max_length = row
                    .try_get::<_, Option<i32>>("char_max_length")?
                    .map(|len| len.max(0) as usize);
                Ok(column)
            })
            .collect()
    }

    async fn count(&self, table: &str, watermark: Option<&Watermark>) -> Result<u64, DbError> {
        let (sql, params) = self.generator().count(table, watermark);
        let rows = self.query(&sql, params).await?;
        let count = match rows.first() {
            Some(row) => row.try_get::<_, i64>(COUNT_ALIAS)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn max(&self, table: &str, column: &str) -> Result<Value, DbError> {
        let sql = self.generator().max(table, column);
        let rows = self.query(&sql, Vec::new()).await?;
        match rows.first() {
            Some(row) => column_value(row, 0),
            None => Ok(Value::Null),
        }
    }

    async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        let (sql, params) = self.generator().select(request);
        let rows = self.query(&sql, params).await?;
        rows.iter()
            .map(|row| to_row_data(&request.table, row))
            .collect()
    }

    async fn create_table(&self, table: &str) -> Result<(), DbError> {
        self.execute(&self.generator().create_table(table), Vec::new())
            .await
            .map(|_| ())
    }

    async fn drop_table(&self, table: &str) -> Result<(), DbError> {
        self.execute(&self.generator().drop_table(table), Vec::new())
            .await
            .map(|_| ())
    }

    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError> {
        self.execute(&self.generator().add_column(table, column), Vec::new())
            .await
            .map(|_| ())
    }

    async fn widen_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError> {
        self.execute(&self.generator().alter_column_type(table, column), Vec::new())
            .await
            .map(|_| ())
    }

    async fn upsert(&self, statement: &UpsertStatement, values: Vec<Value>) -> Result<u64, DbError> {
        self.execute(&statement.sql, values).await
    }
}
