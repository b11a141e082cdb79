use crate::{
    error::SyncError,
    execution::{
        observer,
        task::{SyncMode, SyncTask},
    },
    settings::SyncConfig,
};
use async_trait::async_trait;
use connectors::{
    adapter::Adapter,
    connector::{BatchHandler, Connector},
    error::AdapterError,
    events::EventSink,
};
use futures::{StreamExt, stream};
use model::{events::ConnectorEvent, records::batch::RowBatch};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info, warn};

/// Outcome of one table copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub source_table: String,
    pub destination_table: String,
    pub mode: SyncMode,
    pub rows_read: usize,
    pub rows_written: usize,
    pub error: Option<String>,
}

impl TableReport {
    fn new(source_table: &str, destination_table: &str) -> Self {
        TableReport {
            source_table: source_table.to_string(),
            destination_table: destination_table.to_string(),
            mode: SyncMode::Full,
            rows_read: 0,
            rows_written: 0,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Every table of a run, in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
}

impl RunReport {
    /// Destination tables whose copy failed.
    pub fn failed(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| !t.succeeded())
            .map(|t| t.destination_table.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.tables.iter().all(TableReport::succeeded)
    }

    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(|t| t.rows_written).sum()
    }
}

/// Builds the configured connectors, wires their events into `tracing`
/// and runs the sync.
pub async fn run(config: &SyncConfig) -> Result<RunReport, SyncError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let observer = observer::spawn(rx);

    let result = sync(config, tx).await;

    // Resolves once every connector, and with it every sender, is gone.
    if let Err(err) = observer.await {
        warn!("Event observer stopped: {err}");
    }
    result
}

async fn sync(
    config: &SyncConfig,
    events: UnboundedSender<ConnectorEvent>,
) -> Result<RunReport, SyncError> {
    let settings = config.connector_settings();
    let source = Adapter::from_config(
        &config.source,
        config.connection(&config.source)?,
        settings.clone(),
        EventSink::attached(&config.source, events.clone()),
    )?;
    let destination = Adapter::from_config(
        &config.destination,
        config.connection(&config.destination)?,
        settings,
        EventSink::attached(&config.destination, events),
    )?;

    run_with(&source, &destination, config).await
}

/// Copies the configured tables from `source` to `destination`.
///
/// Both connectors are connected first and always disconnected at the end.
/// A failed table is logged and reported without stopping its siblings; the
/// run fails if any table did.
pub async fn run_with(
    source: &dyn Connector,
    destination: &dyn Connector,
    config: &SyncConfig,
) -> Result<RunReport, SyncError> {
    info!(
        source = source.name(),
        destination = destination.name(),
        "Starting sync"
    );

    if let Err(err) = futures::try_join!(source.connect(), destination.connect()) {
        error!("Failed to connect: {err}");
        disconnect_all(source, destination).await;
        return Err(err.into());
    }

    let tables = match &config.tables {
        Some(tables) => tables.clone(),
        None => source.tables(),
    };
    info!("Syncing {} tables", tables.len());

    let reports: Vec<TableReport> = stream::iter(tables.iter())
        .map(|table| copy_table(source, destination, table, table, &config.update_columns))
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    info!("disconnecting...");
    disconnect_all(source, destination).await;

    let report = RunReport { tables: reports };
    if !report.is_success() {
        error!("Sync finished with failed tables: {}", report.failed().join(", "));
        return Err(SyncError::TablesFailed(report));
    }

    info!("sync complete");
    Ok(report)
}

async fn disconnect_all(source: &dyn Connector, destination: &dyn Connector) {
    let (src, dst) = futures::join!(source.disconnect(), destination.disconnect());
    for (name, result) in [(source.name(), src), (destination.name(), dst)] {
        if let Err(err) = result {
            warn!(connector = name, "Failed to disconnect: {err}");
        }
    }
}

/// Copies one table, full or incremental as the destination dictates.
/// Never fails; the error, if any, is in the report.
pub async fn copy_table(
    source: &dyn Connector,
    destination: &dyn Connector,
    source_table: &str,
    destination_table: &str,
    update_columns: &[String],
) -> TableReport {
    info!(
        "copying {}.{source_table} to {}.{destination_table}",
        source.name(),
        destination.name()
    );

    let started = Instant::now();
    let mut report = TableReport::new(source_table, destination_table);

    match copy(source, destination, update_columns, &mut report).await {
        Ok(()) => info!(
            table = destination_table,
            mode = %report.mode,
            "Copied {} rows in {:.2}s",
            report.rows_written,
            started.elapsed().as_secs_f64()
        ),
        Err(err) => {
            error!(table = destination_table, "Failed to copy: {err}");
            report.error = Some(err.to_string());
        }
    }

    report
}

async fn copy(
    source: &dyn Connector,
    destination: &dyn Connector,
    update_columns: &[String],
    report: &mut TableReport,
) -> Result<(), AdapterError> {
    let task = SyncTask::plan(
        destination,
        &report.source_table,
        &report.destination_table,
        update_columns,
    )
    .await?;
    report.mode = task.mode;

    let mut writer = WriteThrough {
        destination,
        table: &task.destination_table,
        rows_written: 0,
    };
    let result = source
        .read(&task.source_table, &mut writer, &task.read_options())
        .await;
    report.rows_written = writer.rows_written;
    report.rows_read = result?.rows;
    Ok(())
}

/// Writes every window to the destination as soon as it is read.
struct WriteThrough<'a> {
    destination: &'a dyn Connector,
    table: &'a str,
    rows_written: usize,
}

#[async_trait]
impl<'a> BatchHandler for WriteThrough<'a> {
    async fn handle(&mut self, batch: RowBatch) -> Result<(), AdapterError> {
        // The terminal empty window still reaches the destination, which
        // creates the table when the source had no rows at all.
        let summary = self.destination.write(self.table, batch.rows()).await?;
        self.rows_written += summary.rows_written;
        Ok(())
    }
}
