use crate::{
    connector::{BatchHandler, ReadOptions, ReadSummary},
    error::AdapterError,
    events::EventSink,
    sql::base::{adapter::SqlAdapter, error::DbError, requests::FetchRowsRequestBuilder},
};
use model::{
    pagination::cursor::{Cursor, Watermark},
    records::batch::RowBatch,
};
use serde_json::json;

/// Walks a table in fixed-size windows and pushes each one to a handler.
///
/// Every window is handed over (and awaited) before the next is fetched.
/// The loop ends on the first empty window, which is delivered as well.
pub struct PaginatedReader<'a, A: SqlAdapter + ?Sized> {
    adapter: &'a A,
    events: &'a EventSink,
    primary_key: &'a str,
    chunk_size: usize,
}

impl<'a, A: SqlAdapter + ?Sized> PaginatedReader<'a, A> {
    pub fn new(adapter: &'a A, events: &'a EventSink, primary_key: &'a str, chunk_size: usize) -> Self {
        Self {
            adapter,
            events,
            primary_key,
            chunk_size,
        }
    }

    fn fail(&self, table: &str, err: DbError) -> AdapterError {
        self.events.error(&err, Some(json!({ "table": table, "operation": "read" })));
        AdapterError::Database(err)
    }

    pub async fn read(
        &self,
        table: &str,
        handler: &mut dyn BatchHandler,
        options: &ReadOptions,
    ) -> Result<ReadSummary, AdapterError> {
        let columns = match self.adapter.table_columns(table).await {
            Ok(columns) => columns,
            Err(err) if err.is_missing_relation() => Vec::new(),
            Err(err) => return Err(self.fail(table, err)),
        };
        let has_column = |name: &str| columns.iter().any(|c| c.name == name);

        let order_by = has_column(self.primary_key).then(|| self.primary_key.to_string());
        let watermark = options
            .since
            .as_ref()
            .filter(|since| !since.is_null() && has_column(&options.watermark_column))
            .map(|since| Watermark::new(&options.watermark_column, since.clone()));

        let total = match self.adapter.count(table, watermark.as_ref()).await {
            Ok(total) => total,
            Err(err) if err.is_missing_relation() => 0,
            Err(err) => return Err(self.fail(table, err)),
        };

        match &watermark {
            Some(wm) => self.events.info(format!(
                "getting {total} records from {table} newer than {}={}",
                wm.column, wm.value
            )),
            None => self
                .events
                .info(format!("getting {total} records from {table}...")),
        }

        let mut cursor = Cursor::new(self.chunk_size);
        if let Some(wm) = watermark {
            cursor = cursor.with_watermark(wm);
        }

        let mut summary = ReadSummary {
            incremental: cursor.is_incremental(),
            ..ReadSummary::default()
        };

        loop {
            let request = FetchRowsRequestBuilder::new(table)
                .order_by(order_by.clone())
                .watermark(cursor.watermark.clone())
                .limit(cursor.limit)
                .offset(cursor.offset)
                .build();

            let rows = match self.adapter.fetch_rows(&request).await {
                Ok(rows) => rows,
                Err(err) if err.is_missing_relation() => Vec::new(),
                Err(err) => return Err(self.fail(table, err)),
            };

            let fetched = rows.len();
            summary.rows += fetched;
            summary.batches += 1;
            if fetched > 0 {
                self.events
                    .info(format!("got {}/{total} records from {table}", summary.rows));
            }

            handler.handle(RowBatch::new(table, cursor.offset, rows)).await?;

            if fetched == 0 {
                break;
            }
            cursor.advance();
        }

        Ok(summary)
    }
}
