#![allow(dead_code)]

use crate::{destination_url, pg_client, source_url};
use connectors::{
    adapter::Adapter,
    connector::{BatchCollector, Connector, ReadOptions},
    events::EventSink,
    settings::{ConnectionConfig, ConnectorSettings},
};
use engine_runtime::settings::SyncConfig;
use model::records::row::RowData;
use std::collections::BTreeMap;

pub enum Side {
    Source,
    Destination,
}

impl Side {
    pub fn url(&self) -> String {
        match self {
            Side::Source => source_url(),
            Side::Destination => destination_url(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Destination => "destination",
        }
    }
}

/// A connected Postgres connector for one side.
pub async fn pg_connector(side: Side, chunk_size: usize) -> Adapter {
    let config = ConnectionConfig::new("pg", &side.url());
    let adapter = Adapter::from_config(
        side.name(),
        &config,
        ConnectorSettings::default().with_chunk_size(chunk_size),
        EventSink::detached(side.name()),
    )
    .expect("build connector");
    adapter.connect().await.expect("connect");
    adapter
}

/// A config copying `tables` from the source database to the destination.
pub fn sync_config(tables: &[&str], chunk_size: usize) -> SyncConfig {
    SyncConfig {
        connections: BTreeMap::from([
            ("source".to_string(), ConnectionConfig::new("pg", &source_url())),
            ("destination".to_string(), ConnectionConfig::new("pg", &destination_url())),
        ]),
        source: "source".to_string(),
        destination: "destination".to_string(),
        tables: Some(tables.iter().map(|t| t.to_string()).collect()),
        update_columns: vec!["updated_at".to_string(), "created_at".to_string()],
        concurrency: 2,
        chunk_size,
        primary_key: "id".to_string(),
        schema: "public".to_string(),
    }
}

pub async fn execute(side: Side, sql: &str) {
    pg_client(&side.url())
        .await
        .batch_execute(sql)
        .await
        .expect("execute sql");
}

pub async fn read_all(connector: &Adapter, table: &str, options: &ReadOptions) -> BatchCollector {
    let mut collector = BatchCollector::default();
    connector
        .read(table, &mut collector, options)
        .await
        .expect("read table");
    collector
}

pub async fn row_count(side: Side, table: &str) -> i64 {
    pg_client(&side.url())
        .await
        .query_one(&format!("SELECT COUNT(*) FROM public.\"{table}\""), &[])
        .await
        .expect("count rows")
        .get(0)
}

/// The column's `information_schema` data type, if it exists.
pub async fn column_type(side: Side, table: &str, column: &str) -> Option<String> {
    pg_client(&side.url())
        .await
        .query_opt(
            "SELECT data_type::text FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
            &[&table, &column],
        )
        .await
        .expect("query column type")
        .map(|row| row.get(0))
}

pub async fn assert_table_exists(side: Side, table: &str, should: bool) {
    let exists: bool = pg_client(&side.url())
        .await
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = 'public' AND tablename = $1)",
            &[&table],
        )
        .await
        .expect("query table")
        .get(0);
    assert_eq!(exists, should, "table {table} exists: {exists}, expected {should}");
}

pub fn ids(rows: &[RowData]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.get_value("id") {
            model::core::value::Value::Int(id) => id,
            other => panic!("unexpected id {other:?}"),
        })
        .collect()
}
