use crate::{
    connector::{BatchHandler, Connector, ReadOptions, ReadSummary, WriteSummary},
    error::AdapterError,
    events::EventSink,
    settings::ConnectorSettings,
    sql::base::{
        adapter::SqlAdapter,
        error::DbError,
        metadata::column::{ColumnMetadata, order_column_names},
        reader::PaginatedReader,
        schema::registry::SchemaRegistry,
        writer::UpsertWriter,
    },
};
use async_trait::async_trait;
use model::{core::value::Value, pagination::cursor::Watermark, records::row::RowData};
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock};

/// A [`Connector`] over any relational [`SqlAdapter`].
pub struct SqlConnector<A: SqlAdapter> {
    adapter: Arc<A>,
    settings: ConnectorSettings,
    registry: Arc<SchemaRegistry>,
    events: EventSink,
    tables: Arc<RwLock<Vec<String>>>,
}

impl<A: SqlAdapter> Clone for SqlConnector<A> {
    fn clone(&self) -> Self {
        SqlConnector {
            adapter: self.adapter.clone(),
            settings: self.settings.clone(),
            registry: self.registry.clone(),
            events: self.events.clone(),
            tables: self.tables.clone(),
        }
    }
}

impl<A: SqlAdapter> SqlConnector<A> {
    pub fn new(adapter: A, settings: ConnectorSettings, events: EventSink) -> Self {
        SqlConnector {
            adapter: Arc::new(adapter),
            registry: Arc::new(SchemaRegistry::new(&settings.primary_key)),
            settings,
            events,
            tables: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    fn fail(&self, table: &str, operation: &str, err: DbError) -> AdapterError {
        self.events
            .error(&err, Some(json!({ "table": table, "operation": operation })));
        AdapterError::Database(err)
    }
}

#[async_trait]
impl<A: SqlAdapter + 'static> Connector for SqlConnector<A> {
    fn name(&self) -> &str {
        self.events.connector()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        self.adapter.connect().await?;
        let tables = self.adapter.list_tables().await?;
        self.events.debug(format!(
            "connected to {:?} store, found {} tables in schema {}",
            self.adapter.kind(),
            tables.len(),
            self.settings.schema
        ));
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = tables;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.adapter.close().await?;
        self.events.debug("disconnected");
        Ok(())
    }

    fn tables(&self) -> Vec<String> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>, AdapterError> {
        Ok(self.adapter.list_tables().await?)
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, AdapterError> {
        let columns = self.describe_table(table).await?;
        Ok(order_column_names(
            columns.into_iter().map(|c| c.name),
            &self.settings.primary_key,
        ))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnMetadata>, AdapterError> {
        match self.adapter.table_columns(table).await {
            Ok(columns) => Ok(columns),
            Err(err) if err.is_missing_relation() => Ok(Vec::new()),
            Err(err) => Err(self.fail(table, "describe", err)),
        }
    }

    async fn count(&self, table: &str, since: Option<&Watermark>) -> Result<u64, AdapterError> {
        match self.adapter.count(table, since).await {
            Ok(count) => Ok(count),
            Err(err) if err.is_missing_relation() => Ok(0),
            Err(err) => Err(self.fail(table, "count", err)),
        }
    }

    async fn max(&self, table: &str, column: &str) -> Result<Option<Value>, AdapterError> {
        match self.adapter.max(table, column).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_missing_relation() || err.is_missing_column() => Ok(None),
            Err(err) => Err(self.fail(table, "max", err)),
        }
    }

    async fn read(
        &self,
        table: &str,
        handler: &mut dyn BatchHandler,
        options: &ReadOptions,
    ) -> Result<ReadSummary, AdapterError> {
        PaginatedReader::new(
            self.adapter.as_ref(),
            &self.events,
            &self.settings.primary_key,
            self.settings.chunk_size,
        )
        .read(table, handler, options)
        .await
    }

    async fn write(&self, table: &str, rows: &[RowData]) -> Result<WriteSummary, AdapterError> {
        UpsertWriter::new(self.adapter.as_ref(), &self.registry, &self.events)
            .write(table, rows)
            .await
            .map_err(|err| self.fail(table, "write", err))
    }

    async fn ensure_table(&self, table: &str) -> Result<(), AdapterError> {
        self.adapter
            .create_table(table)
            .await
            .map_err(|err| self.fail(table, "ensure_table", err))
    }

    async fn drop_table(&self, table: &str) -> Result<(), AdapterError> {
        self.registry.forget(table).await;
        match self.adapter.drop_table(table).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_missing_relation() => Ok(()),
            Err(err) => Err(self.fail(table, "drop_table", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connector::BatchCollector, sql::memory::adapter::MemoryAdapter};
    use model::{
        core::data_type::ColumnType,
        events::{ConnectorEvent, LogLevel},
        records::batch::RowBatch,
    };
    use tokio::sync::mpsc::UnboundedReceiver;
    use tracing_test::traced_test;

    async fn memory(chunk: usize) -> (SqlConnector<MemoryAdapter>, MemoryAdapter) {
        let store = MemoryAdapter::default();
        let connector = SqlConnector::new(
            store.clone(),
            ConnectorSettings::default().with_chunk_size(chunk),
            EventSink::detached("memory"),
        );
        connector.connect().await.unwrap();
        (connector, store)
    }

    fn row(pairs: Vec<(&str, Value)>) -> RowData {
        RowData::from_pairs("fish", pairs)
    }

    fn ids(collector: &BatchCollector) -> Vec<Value> {
        collector.rows().iter().map(|r| r.get_value("id")).collect()
    }

    fn messages(rx: &mut UnboundedReceiver<ConnectorEvent>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ConnectorEvent::Log { message, level: LogLevel::Info, .. } => out.push(message),
                ConnectorEvent::Error { error, .. } => out.push(format!("error: {error}")),
                _ => {}
            }
        }
        out
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fractional_values() {
        let (connector, _) = memory(10).await;
        connector
            .write("fish", &[row(vec![("id", Value::Int(1)), ("weight", Value::Float(10.00001))])])
            .await
            .unwrap();

        let mut collector = BatchCollector::default();
        connector
            .read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(collector.rows()[0].get_value("weight"), Value::Float(10.00001));
    }

    #[tokio::test]
    async fn test_every_window_reaches_the_handler() {
        let (connector, _) = memory(2).await;
        let rows: Vec<RowData> = [3, 1, 2]
            .into_iter()
            .map(|id| row(vec![("id", Value::Int(id)), ("name", Value::from(format!("fish {id}")))]))
            .collect();
        connector.write("fish", &rows).await.unwrap();

        let mut collector = BatchCollector::default();
        let summary = connector
            .read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap();

        let sizes: Vec<usize> = collector.batches.iter().map(RowBatch::len).collect();
        assert_eq!(sizes, vec![2, 1, 0]);
        assert_eq!(summary.batches, 3);
        assert_eq!(ids(&collector), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[tokio::test]
    async fn test_empty_table_yields_one_empty_batch() {
        let (connector, _) = memory(2).await;
        connector.ensure_table("fish").await.unwrap();

        let mut collector = BatchCollector::default();
        connector
            .read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(collector.batches.len(), 1);
        assert!(collector.batches[0].is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_reads_as_empty() {
        let (connector, _) = memory(2).await;
        let mut collector = BatchCollector::default();
        let summary = connector
            .read("ghost", &mut collector, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(collector.batches.len(), 1);
        assert_eq!(connector.count("ghost", None).await.unwrap(), 0);
        assert_eq!(connector.max("ghost", "updated_at").await.unwrap(), None);
        connector.drop_table("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_incremental_read() {
        let (connector, store) = memory(2).await;
        let rows: Vec<RowData> = (1..=4)
            .map(|id| RowData::from_pairs("carts", vec![("id", Value::Int(id)), ("updated_at", Value::Int(id * 10))]))
            .collect();
        connector.write("carts", &rows).await.unwrap();
        store.clear_statements();

        let mut collector = BatchCollector::default();
        let summary = connector
            .read("carts", &mut collector, &ReadOptions::since("updated_at", Value::Int(30)))
            .await
            .unwrap();

        assert!(summary.incremental);
        assert_eq!(ids(&collector), vec![Value::Int(3), Value::Int(4)]);
        assert_eq!(collector.batches.len(), 2);
        assert!(
            store
                .statements()
                .iter()
                .any(|s| s.contains(r#"WHERE "updated_at" >= $1 ORDER BY "id" LIMIT 2 OFFSET 0"#))
        );
    }

    #[tokio::test]
    async fn test_since_without_watermark_column_reads_everything() {
        let (connector, _) = memory(10).await;
        connector
            .write("fish", &[row(vec![("id", Value::Int(1))]), row(vec![("id", Value::Int(2))])])
            .await
            .unwrap();

        let mut collector = BatchCollector::default();
        let summary = connector
            .read("fish", &mut collector, &ReadOptions::since("updated_at", Value::Int(99)))
            .await
            .unwrap();
        assert!(!summary.incremental);
        assert_eq!(summary.rows, 2);
    }

    #[tokio::test]
    async fn test_type_promotion() {
        let (connector, store) = memory(10).await;
        connector
            .write("fish", &[row(vec![("id", Value::Int(4)), ("weight", Value::Int(10))])])
            .await
            .unwrap();
        assert_eq!(store.column_type("fish", "weight"), Some(ColumnType::Integer));

        let summary = connector
            .write("fish", &[row(vec![("id", Value::Int(4)), ("weight", Value::Float(10.01))])])
            .await
            .unwrap();
        assert_eq!(summary.columns_widened, vec!["weight"]);
        assert_eq!(store.column_type("fish", "weight"), Some(ColumnType::Float));

        let stored = store.rows("fish");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get_value("weight"), Value::Float(10.01));

        // Integral samples never narrow it back.
        connector
            .write("fish", &[row(vec![("id", Value::Int(5)), ("weight", Value::Int(3))])])
            .await
            .unwrap();
        assert_eq!(store.column_type("fish", "weight"), Some(ColumnType::Float));
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_key() {
        let (connector, store) = memory(10).await;
        connector
            .write("fish", &[row(vec![("id", Value::Int(1)), ("name", Value::from("toby"))])])
            .await
            .unwrap();
        connector
            .write("fish", &[row(vec![("id", Value::Int(1)), ("name", Value::from("mark"))])])
            .await
            .unwrap();

        let stored = store.rows("fish");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get_value("name"), Value::from("mark"));
        assert_eq!(connector.count("fish", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_absent_fields_are_not_nulled_by_siblings() {
        let (connector, store) = memory(10).await;
        connector
            .write(
                "fish",
                &[row(vec![
                    ("id", Value::Int(1)),
                    ("name", Value::from("toby")),
                    ("color", Value::from("gold")),
                ])],
            )
            .await
            .unwrap();

        connector
            .write(
                "fish",
                &[
                    row(vec![("id", Value::Int(1)), ("name", Value::from("tobias"))]),
                    row(vec![("id", Value::Int(2)), ("color", Value::from("blue"))]),
                ],
            )
            .await
            .unwrap();

        let stored = store.rows("fish");
        let first = stored.iter().find(|r| r.get_value("id") == Value::Int(1)).unwrap();
        assert_eq!(first.get_value("name"), Value::from("tobias"));
        assert_eq!(first.get_value("color"), Value::from("gold"));

        let second = stored.iter().find(|r| r.get_value("id") == Value::Int(2)).unwrap();
        assert_eq!(second.get_value("name"), Value::Null);
    }

    #[tokio::test]
    async fn test_schema_evolution_from_scratch() {
        let (connector, store) = memory(10).await;
        let summary = connector
            .write(
                "fish",
                &[
                    row(vec![("id", Value::Int(1)), ("name", Value::from("toby")), ("note", Value::from(""))]),
                    row(vec![("id", Value::Int(2)), ("alive", Value::Boolean(true)), ("note", Value::Null)]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.columns_added, vec!["id", "name", "alive"]);
        assert_eq!(connector.list_columns("fish").await.unwrap(), vec!["id", "alive", "name"]);
        assert!(
            store
                .statements()
                .contains(&r#"ALTER TABLE "public"."fish" ADD COLUMN "id" BIGINT PRIMARY KEY"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let (connector, _) = memory(10).await;
        connector.ensure_table("fish").await.unwrap();
        connector.ensure_table("fish").await.unwrap();
        assert_eq!(connector.list_tables().await.unwrap(), vec!["fish"]);
    }

    #[tokio::test]
    async fn test_empty_write_still_creates_the_table() {
        let (connector, _) = memory(10).await;
        let summary = connector.write("fish", &[]).await.unwrap();
        assert_eq!(summary.rows_written, 0);
        assert_eq!(connector.list_tables().await.unwrap(), vec!["fish"]);
    }

    #[tokio::test]
    async fn test_max_and_missing_column() {
        let (connector, _) = memory(10).await;
        connector
            .write("carts", &[RowData::from_pairs("carts", vec![("id", Value::Int(1)), ("updated_at", Value::Int(7))])])
            .await
            .unwrap();
        assert_eq!(connector.max("carts", "updated_at").await.unwrap(), Some(Value::Int(7)));
        assert_eq!(connector.max("carts", "created_at").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fatal_errors_propagate_and_emit() {
        let store = MemoryAdapter::default();
        let (events, mut rx) = EventSink::channel("memory");
        let connector = SqlConnector::new(store.clone(), ConnectorSettings::default(), events);
        connector.connect().await.unwrap();
        connector.ensure_table("fish").await.unwrap();
        store.inject_failure("fish");

        let mut collector = BatchCollector::default();
        let err = connector
            .read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap_err();
        assert!(!err.is_missing_relation());

        let logged = messages(&mut rx);
        assert!(logged.iter().any(|m| m.starts_with("error: ") && m.contains("simulated failure")));
    }

    #[tokio::test]
    async fn test_progress_messages() {
        let store = MemoryAdapter::default();
        let (events, mut rx) = EventSink::channel("memory");
        let connector = SqlConnector::new(
            store,
            ConnectorSettings::default().with_chunk_size(2),
            events,
        );
        connector.connect().await.unwrap();
        let rows: Vec<RowData> = (1..=3).map(|id| row(vec![("id", Value::Int(id))])).collect();
        connector.write("fish", &rows).await.unwrap();

        let mut collector = BatchCollector::default();
        connector
            .read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap();

        assert_eq!(
            messages(&mut rx),
            vec![
                "wrote 3 records to fish",
                "getting 3 records from fish...",
                "got 2/3 records from fish",
                "got 3/3 records from fish",
            ]
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn test_schema_changes_are_traced() {
        let (connector, _) = memory(10).await;
        connector
            .write("fish", &[row(vec![("id", Value::Int(1)), ("weight", Value::Int(1))])])
            .await
            .unwrap();
        connector
            .write("fish", &[row(vec![("id", Value::Int(1)), ("weight", Value::Float(1.5))])])
            .await
            .unwrap();

        assert!(logs_contain("Adding column"));
        assert!(logs_contain("Widening column to FLOAT"));
    }

    #[tokio::test]
    async fn test_write_after_another_connector_dropped_the_table() {
        let store = MemoryAdapter::default();
        let writer = SqlConnector::new(store.clone(), ConnectorSettings::default(), EventSink::detached("a"));
        let other = SqlConnector::new(store.clone(), ConnectorSettings::default(), EventSink::detached("b"));
        writer.connect().await.unwrap();
        other.connect().await.unwrap();

        writer
            .write("fish", &[row(vec![("id", Value::Int(1)), ("name", Value::from("x"))])])
            .await
            .unwrap();
        other.drop_table("fish").await.unwrap();

        let summary = writer
            .write(
                "fish",
                &[
                    row(vec![("id", Value::Int(1)), ("name", Value::from("x"))]),
                    row(vec![("id", Value::Int(2)), ("name", Value::from("y"))]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.columns_added, vec!["id", "name"]);
        assert_eq!(writer.list_columns("fish").await.unwrap(), vec!["id", "name"]);
        assert_eq!(store.rows("fish").len(), 2);
    }

    #[tokio::test]
    async fn test_connect_caches_tables() {
        let store = MemoryAdapter::default();
        let first = SqlConnector::new(store.clone(), ConnectorSettings::default(), EventSink::detached("a"));
        first.connect().await.unwrap();
        first.ensure_table("fish").await.unwrap();

        let second = SqlConnector::new(store, ConnectorSettings::default(), EventSink::detached("b"));
        assert!(second.tables().is_empty());
        second.connect().await.unwrap();
        assert_eq!(second.tables(), vec!["fish"]);
    }
}
