use crate::{
    connector::{BatchHandler, Connector, ReadOptions, ReadSummary, WriteSummary},
    error::AdapterError,
    events::EventSink,
    file::csv::connector::CsvConnector,
    settings::{ConnectionConfig, ConnectorSettings},
    sql::{
        base::{connector::SqlConnector, metadata::column::ColumnMetadata},
        memory::adapter::MemoryAdapter,
        postgres::adapter::PgAdapter,
    },
};
use async_trait::async_trait;
use lazy_static::lazy_static;
use model::{
    core::value::Value,
    pagination::cursor::Watermark,
    records::row::RowData,
};
use std::{collections::HashMap, fmt};

/// The closed set of connector implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorKind {
    Postgres,
    Memory,
    Csv,
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectorKind::Postgres => "postgres",
            ConnectorKind::Memory => "memory",
            ConnectorKind::Csv => "csv",
        };
        write!(f, "{name}")
    }
}

lazy_static! {
    static ref CONNECTOR_REGISTRY: HashMap<&'static str, ConnectorKind> = HashMap::from([
        ("pg", ConnectorKind::Postgres),
        ("postgres", ConnectorKind::Postgres),
        ("postgresql", ConnectorKind::Postgres),
        ("memory", ConnectorKind::Memory),
        ("csv", ConnectorKind::Csv),
    ]);
}

impl ConnectorKind {
    /// Resolves a connection `type` name, case-insensitively.
    pub fn lookup(name: &str) -> Result<Self, AdapterError> {
        CONNECTOR_REGISTRY
            .get(name.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| AdapterError::UnsupportedConnector(name.to_string()))
    }
}

#[derive(Clone)]
pub enum Adapter {
    Postgres(SqlConnector<PgAdapter>),
    Memory(SqlConnector<MemoryAdapter>),
    Csv(CsvConnector),
}

impl Adapter {
    /// Builds the connector a named connection describes. Nothing is
    /// connected until [`Connector::connect`] is called.
    pub fn from_config(
        name: &str,
        config: &ConnectionConfig,
        settings: ConnectorSettings,
        events: EventSink,
    ) -> Result<Self, AdapterError> {
        let adapter = match ConnectorKind::lookup(&config.kind)? {
            ConnectorKind::Postgres => {
                let pg = PgAdapter::new(&config.connection_string, &settings, events.clone());
                Adapter::Postgres(SqlConnector::new(pg, settings, events))
            }
            ConnectorKind::Memory => Adapter::Memory(SqlConnector::new(
                MemoryAdapter::new(&settings.schema),
                settings,
                events,
            )),
            ConnectorKind::Csv => Adapter::Csv(CsvConnector::from_connection_string(
                &config.connection_string,
                settings,
                events,
            )),
        };
        tracing::debug!(connection = name, kind = %adapter.kind(), "Built connector");
        Ok(adapter)
    }

    pub fn memory(store: MemoryAdapter, settings: ConnectorSettings, events: EventSink) -> Self {
        Adapter::Memory(SqlConnector::new(store, settings, events))
    }

    pub fn kind(&self) -> ConnectorKind {
        match self {
            Adapter::Postgres(_) => ConnectorKind::Postgres,
            Adapter::Memory(_) => ConnectorKind::Memory,
            Adapter::Csv(_) => ConnectorKind::Csv,
        }
    }

    fn inner(&self) -> &dyn Connector {
        match self {
            Adapter::Postgres(c) => c,
            Adapter::Memory(c) => c,
            Adapter::Csv(c) => c,
        }
    }
}

#[async_trait]
impl Connector for Adapter {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        self.inner().connect().await
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.inner().disconnect().await
    }

    fn tables(&self) -> Vec<String> {
        self.inner().tables()
    }

    async fn list_tables(&self) -> Result<Vec<String>, AdapterError> {
        self.inner().list_tables().await
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, AdapterError> {
        self.inner().list_columns(table).await
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnMetadata>, AdapterError> {
        self.inner().describe_table(table).await
    }

    async fn count(&self, table: &str, since: Option<&Watermark>) -> Result<u64, AdapterError> {
        self.inner().count(table, since).await
    }

    async fn max(&self, table: &str, column: &str) -> Result<Option<Value>, AdapterError> {
        self.inner().max(table, column).await
    }

    async fn read(
        &self,
        table: &str,
        handler: &mut dyn BatchHandler,
        options: &ReadOptions,
    ) -> Result<ReadSummary, AdapterError> {
        self.inner().read(table, handler, options).await
    }

    async fn write(&self, table: &str, rows: &[RowData]) -> Result<WriteSummary, AdapterError> {
        self.inner().write(table, rows).await
    }

    async fn ensure_table(&self, table: &str) -> Result<(), AdapterError> {
        self.inner().ensure_table(table).await
    }

    async fn drop_table(&self, table: &str) -> Result<(), AdapterError> {
        self.inner().drop_table(table).await
    }
}
