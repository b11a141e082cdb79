use crate::{
    connector::{BatchHandler, Connector, ReadOptions, ReadSummary, WriteSummary},
    error::AdapterError,
    events::EventSink,
    file::csv::{adapter::CsvAdapter, error::FileError},
    settings::ConnectorSettings,
    sql::base::metadata::column::{ColumnMetadata, order_column_names},
};
use async_trait::async_trait;
use model::{
    core::value::Value,
    pagination::cursor::Watermark,
    records::{
        batch::RowBatch,
        row::RowData,
    },
};
use serde_json::json;
use std::{
    cmp::Ordering,
    io,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

/// A directory of CSV files viewed as a store: table `t` is `<dir>/t.csv`.
///
/// Writes upsert on the primary key: a row replaces the fields it carries in
/// the stored row with the same key, new keys widen the header, and the file
/// is rewritten as a whole.
#[derive(Clone)]
pub struct CsvConnector {
    dir: PathBuf,
    adapter: CsvAdapter,
    settings: ConnectorSettings,
    events: EventSink,
    tables: Arc<RwLock<Vec<String>>>,
}

impl CsvConnector {
    pub fn new(dir: impl Into<PathBuf>, settings: ConnectorSettings, events: EventSink) -> Self {
        CsvConnector {
            dir: dir.into(),
            adapter: CsvAdapter::new(settings.csv_batch_size),
            settings,
            events,
            tables: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Accepts a bare directory or a `file://` URL.
    pub fn from_connection_string(
        connection_string: &str,
        settings: ConnectorSettings,
        events: EventSink,
    ) -> Self {
        let dir = connection_string
            .strip_prefix("file://")
            .unwrap_or(connection_string);
        CsvConnector::new(dir, settings, events)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }

    /// `None` when the table's file does not exist.
    async fn header(&self, table: &str) -> Result<Option<Vec<String>>, FileError> {
        match self.adapter.headers(&self.path(table)).await {
            Ok(header) => Ok(Some(header)),
            Err(FileError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn fail(&self, table: &str, operation: &str, err: FileError) -> AdapterError {
        self.events
            .error(&err, Some(json!({ "table": table, "operation": operation })));
        AdapterError::FileError(err)
    }

    async fn merge(&self, table: &str, rows: &[RowData]) -> Result<WriteSummary, FileError> {
        let path = self.path(table);
        if rows.is_empty() {
            self.adapter.touch(&path).await?;
            return Ok(WriteSummary::default());
        }

        let merged = self
            .adapter
            .upsert(&path, &self.settings.primary_key, rows)
            .await?;
        Ok(WriteSummary {
            rows_written: merged.rows,
            columns_added: merged.columns_added,
            ..WriteSummary::default()
        })
    }
}

/// Wraps a handler with the same progress messages the SQL reader emits.
struct Progress<'a> {
    inner: &'a mut dyn BatchHandler,
    events: &'a EventSink,
    table: &'a str,
    total: u64,
    seen: usize,
}

#[async_trait]
impl<'a> BatchHandler for Progress<'a> {
    async fn handle(&mut self, batch: RowBatch) -> Result<(), AdapterError> {
        if !batch.is_empty() {
            self.seen += batch.len();
            self.events
                .info(format!("got {}/{} records from {}", self.seen, self.total, self.table));
        }
        self.inner.handle(batch).await
    }
}

#[async_trait]
impl Connector for CsvConnector {
    fn name(&self) -> &str {
        self.events.connector()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        let is_dir = tokio::fs::metadata(&self.dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(FileError::NotADirectory(self.dir.display().to_string()).into());
        }

        let tables = self.list_tables().await?;
        self.events.debug(format!(
            "connected to {}, found {} tables",
            self.dir.display(),
            tables.len()
        ));
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = tables;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
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
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(FileError::from)?;
        let mut tables = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(FileError::from)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv")
                && let Some(stem) = path.file_stem()
            {
                tables.push(stem.to_string_lossy().into_owned());
            }
        }
        tables.sort();
        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, AdapterError> {
        let header = self
            .header(table)
            .await
            .map_err(|err| self.fail(table, "list_columns", err))?;
        Ok(order_column_names(
            header.unwrap_or_default(),
            &self.settings.primary_key,
        ))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnMetadata>, AdapterError> {
        let header = self
            .header(table)
            .await
            .map_err(|err| self.fail(table, "describe", err))?;
        Ok(header
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(idx, name)| ColumnMetadata::new(name, "text", idx + 1))
            .collect())
    }

    async fn count(&self, table: &str, since: Option<&Watermark>) -> Result<u64, AdapterError> {
        match self.adapter.scan(&self.path(table), table, since.cloned()).await {
            Ok(rows) => Ok(rows.len() as u64),
            Err(FileError::NotFound(_)) => Ok(0),
            Err(err) => Err(self.fail(table, "count", err)),
        }
    }

    async fn max(&self, table: &str, column: &str) -> Result<Option<Value>, AdapterError> {
        let rows = match self.adapter.scan(&self.path(table), table, None).await {
            Ok(rows) => rows,
            Err(FileError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(self.fail(table, "max", err)),
        };

        let max = rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .fold(None::<&Value>, |best, v| match best {
                Some(b) if b.compare(v) != Some(Ordering::Less) => Some(b),
                _ => Some(v),
            });
        Ok(max.cloned())
    }

    async fn read(
        &self,
        table: &str,
        handler: &mut dyn BatchHandler,
        options: &ReadOptions,
    ) -> Result<ReadSummary, AdapterError> {
        let header = self
            .header(table)
            .await
            .map_err(|err| self.fail(table, "read", err))?;

        let Some(header) = header else {
            self.events.info(format!("getting 0 records from {table}..."));
            handler.handle(RowBatch::empty(table, 0)).await?;
            return Ok(ReadSummary {
                rows: 0,
                batches: 1,
                incremental: false,
            });
        };

        let watermark = options
            .since
            .as_ref()
            .filter(|since| !since.is_null() && header.contains(&options.watermark_column))
            .map(|since| Watermark::new(&options.watermark_column, since.clone()));

        let total = self.count(table, watermark.as_ref()).await?;
        match &watermark {
            Some(wm) => self.events.info(format!(
                "getting {total} records from {table} newer than {}={}",
                wm.column, wm.value
            )),
            None => self
                .events
                .info(format!("getting {total} records from {table}...")),
        }

        let mut progress = Progress {
            inner: handler,
            events: &self.events,
            table,
            total,
            seen: 0,
        };

        match self
            .adapter
            .read(&self.path(table), table, watermark, &mut progress)
            .await
        {
            Ok(summary) => Ok(summary),
            Err(AdapterError::FileError(err)) => Err(self.fail(table, "read", err)),
            Err(err) => Err(err),
        }
    }

    async fn write(&self, table: &str, rows: &[RowData]) -> Result<WriteSummary, AdapterError> {
        let summary = self
            .merge(table, rows)
            .await
            .map_err(|err| self.fail(table, "write", err))?;
        if summary.rows_written > 0 {
            self.events
                .info(format!("wrote {} records to {table}", summary.rows_written));
        }
        Ok(summary)
    }

    async fn ensure_table(&self, table: &str) -> Result<(), AdapterError> {
        self.adapter
            .touch(&self.path(table))
            .await
            .map_err(|err| self.fail(table, "ensure_table", err))
    }

    async fn drop_table(&self, table: &str) -> Result<(), AdapterError> {
        match tokio::fs::remove_file(self.path(table)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.fail(table, "drop_table", err.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::BatchCollector;
    use model::events::ConnectorEvent;
    use tempfile::TempDir;

    fn connector(dir: &TempDir, chunk: usize) -> CsvConnector {
        CsvConnector::new(
            dir.path(),
            ConnectorSettings::default().with_csv_batch_size(chunk),
            EventSink::detached("files"),
        )
    }

    fn fish(id: i64, name: &str) -> RowData {
        RowData::from_pairs("fish", vec![("id", Value::Int(id)), ("name", Value::from(name))])
    }

    #[tokio::test]
    async fn test_connect_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = CsvConnector::new(
            dir.path().join("nope"),
            ConnectorSettings::default(),
            EventSink::detached("files"),
        );
        let err = missing.connect().await.unwrap_err();
        assert!(matches!(err, AdapterError::FileError(FileError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let csv = connector(&dir, 2);
        csv.connect().await.unwrap();

        let summary = csv
            .write("fish", &[fish(1, "toby"), fish(2, "mark"), fish(3, "sally")])
            .await
            .unwrap();
        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.columns_added, vec!["id", "name"]);

        assert_eq!(csv.list_tables().await.unwrap(), vec!["fish"]);
        assert_eq!(csv.list_columns("fish").await.unwrap(), vec!["id", "name"]);
        assert_eq!(csv.count("fish", None).await.unwrap(), 3);
        assert_eq!(csv.max("fish", "id").await.unwrap(), Some(Value::Int(3)));

        let mut collector = BatchCollector::default();
        let read = csv
            .read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(read.rows, 3);
        assert_eq!(collector.rows()[1], fish(2, "mark"));
    }

    #[tokio::test]
    async fn test_write_upserts_on_primary_key() {
        let dir = TempDir::new().unwrap();
        let csv = connector(&dir, 10);
        csv.write("fish", &[fish(1, "toby"), fish(2, "mark")]).await.unwrap();

        let finned = RowData::from_pairs("fish", vec![("id", Value::Int(3)), ("fins", Value::Int(2))]);
        let summary = csv.write("fish", &[fish(1, "tobias"), finned]).await.unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.columns_added, vec!["fins"]);

        let fins_only = RowData::from_pairs("fish", vec![("id", Value::Int(2)), ("fins", Value::Int(4))]);
        csv.write("fish", &[fins_only]).await.unwrap();

        assert_eq!(csv.count("fish", None).await.unwrap(), 3);
        assert_eq!(csv.list_columns("fish").await.unwrap(), vec!["id", "fins", "name"]);

        let mut collector = BatchCollector::default();
        csv.read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap();
        let rows = collector.rows();
        assert_eq!(rows[0].get_value("name"), Value::from("tobias"));
        assert_eq!(rows[0].get_value("fins"), Value::Null);
        assert_eq!(rows[1].get_value("name"), Value::from("mark"));
        assert_eq!(rows[1].get_value("fins"), Value::Int(4));
        assert_eq!(rows[2].get_value("id"), Value::Int(3));
        assert_eq!(rows[2].get_value("name"), Value::Null);
        assert!(!dir.path().join("fish.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_rows_without_a_key_are_appended() {
        let dir = TempDir::new().unwrap();
        let csv = connector(&dir, 10);
        let note = |text: &str| RowData::from_pairs("notes", vec![("text", Value::from(text))]);

        csv.write("notes", &[note("a")]).await.unwrap();
        csv.write("notes", &[note("a"), note("b")]).await.unwrap();
        assert_eq!(csv.count("notes", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_table_tolerance() {
        let dir = TempDir::new().unwrap();
        let csv = connector(&dir, 10);

        assert_eq!(csv.max("ghost", "updated_at").await.unwrap(), None);
        assert_eq!(csv.count("ghost", None).await.unwrap(), 0);
        csv.drop_table("ghost").await.unwrap();

        let mut collector = BatchCollector::default();
        let summary = csv
            .read("ghost", &mut collector, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.batches, 1);
        assert!(collector.batches[0].is_empty());
    }

    #[tokio::test]
    async fn test_incremental_read_filters_rows() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("carts.csv"),
            "id,updated_at\n1,2020-01-01 00:00:00\n2,2020-02-01 00:00:00\n3,2020-03-01 00:00:00\n",
        )
        .unwrap();
        let csv = connector(&dir, 10);

        let since = model::core::value::parse_timestamp("2020-02-01 00:00:00").unwrap();
        let mut collector = BatchCollector::default();
        let summary = csv
            .read(
                "carts",
                &mut collector,
                &ReadOptions::since("updated_at", Value::Timestamp(since)),
            )
            .await
            .unwrap();

        assert!(summary.incremental);
        let ids: Vec<Value> = collector.rows().iter().map(|r| r.get_value("id")).collect();
        assert_eq!(ids, vec![Value::Int(2), Value::Int(3)]);
    }

    #[tokio::test]
    async fn test_ensure_and_drop() {
        let dir = TempDir::new().unwrap();
        let csv = connector(&dir, 10);
        csv.ensure_table("fish").await.unwrap();
        csv.ensure_table("fish").await.unwrap();
        assert!(csv.path("fish").exists());
        assert!(csv.list_columns("fish").await.unwrap().is_empty());

        csv.write("fish", &[fish(1, "toby")]).await.unwrap();
        assert_eq!(csv.count("fish", None).await.unwrap(), 1);

        csv.drop_table("fish").await.unwrap();
        assert!(!csv.path("fish").exists());
    }

    #[tokio::test]
    async fn test_progress_events() {
        let dir = TempDir::new().unwrap();
        let (events, mut rx) = EventSink::channel("files");
        let csv = CsvConnector::new(dir.path(), ConnectorSettings::default(), events);
        csv.write("fish", &[fish(1, "toby")]).await.unwrap();

        let mut collector = BatchCollector::default();
        csv.read("fish", &mut collector, &ReadOptions::default())
            .await
            .unwrap();

        let mut messages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ConnectorEvent::Log { message, .. } = event {
                messages.push(message);
            }
        }
        assert_eq!(
            messages,
            vec![
                "wrote 1 records to fish",
                "getting 1 records from fish...",
                "got 1/1 records from fish",
            ]
        );
    }
}
