use crate::{
    connector::{BatchHandler, ReadSummary},
    error::AdapterError,
    file::csv::{cast::cast_cell, error::FileError},
};
use model::{
    core::value::Value,
    pagination::cursor::Watermark,
    records::{
        batch::{RowBatch, union_keys},
        row::{FieldValue, RowData},
    },
};
use std::{
    cmp::Ordering,
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io,
    path::Path,
    sync::mpsc::{Receiver, sync_channel},
};
use tokio::{sync::mpsc, task};
use tracing::debug;

type Chunk = Result<Vec<RowData>, FileError>;

/// Outcome of [`CsvAdapter::upsert`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Merged {
    pub rows: usize,
    pub columns_added: Vec<String>,
}

/// Streams and writes single CSV files.
///
/// Parsing happens on a blocking thread that hands over one buffer of
/// `batch_size` rows at a time and then waits until the handler is done
/// with it before parsing any further.
#[derive(Debug, Clone)]
pub struct CsvAdapter {
    batch_size: usize,
}

impl CsvAdapter {
    pub fn new(batch_size: usize) -> Self {
        CsvAdapter {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Reads `path`, handing each buffer to `handler` as a batch of `entity`.
    /// The final (possibly empty) remainder is always delivered.
    pub async fn read(
        &self,
        path: &Path,
        entity: &str,
        watermark: Option<Watermark>,
        handler: &mut dyn BatchHandler,
    ) -> Result<ReadSummary, AdapterError> {
        let (tx, mut rx) = mpsc::channel::<Chunk>(1);
        let (resume_tx, resume_rx) = sync_channel::<()>(1);

        let watermark_set = watermark.is_some();
        let producer = {
            let path = path.to_path_buf();
            let entity = entity.to_string();
            let batch_size = self.batch_size;
            task::spawn_blocking(move || {
                produce(&path, &entity, watermark.as_ref(), batch_size, &tx, &resume_rx)
            })
        };

        let mut summary = ReadSummary {
            incremental: watermark_set,
            ..ReadSummary::default()
        };

        while let Some(chunk) = rx.recv().await {
            let rows = chunk?;
            let offset = summary.rows;
            summary.rows += rows.len();
            summary.batches += 1;

            handler.handle(RowBatch::new(entity, offset, rows)).await?;
            let _ = resume_tx.try_send(());
        }

        producer
            .await
            .map_err(|err| FileError::ReadError(err.to_string()))?;
        debug!(path = %path.display(), rows = summary.rows, "Finished reading CSV");
        Ok(summary)
    }

    /// Header row of `path`, trimmed.
    pub async fn headers(&self, path: &Path) -> Result<Vec<String>, FileError> {
        let path = path.to_path_buf();
        blocking(move || {
            let mut reader = open_reader(&path)?;
            trimmed_headers(&mut reader)
        })
        .await
    }

    /// Every row of `path` at or above `watermark`, fully materialized.
    pub async fn scan(
        &self,
        path: &Path,
        entity: &str,
        watermark: Option<Watermark>,
    ) -> Result<Vec<RowData>, FileError> {
        let path = path.to_path_buf();
        let entity = entity.to_string();
        blocking(move || {
            let mut reader = open_reader(&path)?;
            let headers = trimmed_headers(&mut reader)?;
            let mut rows = Vec::new();
            for record in reader.records() {
                let row = to_row(&entity, &headers, &record?);
                if passes(&row, watermark.as_ref()) {
                    rows.push(row);
                }
            }
            Ok(rows)
        })
        .await
    }

    /// Merges `rows` into `path`, keyed on `primary_key`, and rewrites it.
    ///
    /// A row whose key matches a stored row overwrites only the fields it
    /// carries; any other row is appended. Keys the header lacks are added at
    /// its end. Stored cells are kept verbatim. The new content goes to a
    /// staging file that is then renamed over `path`.
    pub async fn upsert(
        &self,
        path: &Path,
        primary_key: &str,
        rows: &[RowData],
    ) -> Result<Merged, FileError> {
        let path = path.to_path_buf();
        let primary_key = primary_key.to_string();
        let rows = rows.to_vec();
        blocking(move || {
            let (mut header, mut records) = match open_reader(&path) {
                Ok(mut reader) => {
                    let header = trimmed_headers(&mut reader)?;
                    let mut records = Vec::new();
                    for record in reader.records() {
                        records.push(record?.iter().map(str::to_string).collect::<Vec<_>>());
                    }
                    (header, records)
                }
                Err(FileError::NotFound(_)) => (Vec::new(), Vec::new()),
                Err(err) => return Err(err),
            };

            let mut merged = Merged::default();
            for key in union_keys(&rows) {
                if !header.contains(&key) {
                    header.push(key.clone());
                    merged.columns_added.push(key);
                }
            }
            for record in records.iter_mut() {
                record.resize(header.len(), String::new());
            }

            let mut index: HashMap<String, usize> = HashMap::new();
            if let Some(pos) = header.iter().position(|h| *h == primary_key) {
                for (idx, record) in records.iter().enumerate() {
                    let key = record[pos].trim();
                    if !key.is_empty() {
                        index.insert(key.to_string(), idx);
                    }
                }
            }

            for row in rows.iter().filter(|row| !row.is_empty()) {
                let key = row
                    .get(&primary_key)
                    .and_then(Value::as_text)
                    .filter(|key| !key.is_empty());
                let existing = key.as_ref().and_then(|key| index.get(key)).copied();
                match existing {
                    Some(idx) => {
                        for (pos, name) in header.iter().enumerate() {
                            if let Some(value) = row.get(name) {
                                records[idx][pos] = value.as_text().unwrap_or_default();
                            }
                        }
                    }
                    None => {
                        if let Some(key) = key {
                            index.insert(key, records.len());
                        }
                        records.push(render(row, &header));
                    }
                }
                merged.rows += 1;
            }

            let staging = path.with_extension("csv.tmp");
            let mut writer = csv::Writer::from_path(&staging)?;
            if !header.is_empty() {
                writer.write_record(&header)?;
            }
            for record in &records {
                writer.write_record(record)?;
            }
            writer.flush()?;
            drop(writer);
            fs::rename(&staging, &path)?;

            debug!(path = %path.display(), rows = merged.rows, "Merged rows into CSV");
            Ok(merged)
        })
        .await
    }

    /// Creates `path` with no content when it does not exist yet.
    pub async fn touch(&self, path: &Path) -> Result<(), FileError> {
        let path = path.to_path_buf();
        blocking(move || {
            OpenOptions::new().create(true).append(true).open(&path)?;
            Ok(())
        })
        .await
    }
}

async fn blocking<T, F>(f: F) -> Result<T, FileError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FileError> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|err| FileError::ReadError(err.to_string()))?
}

fn not_found(path: &Path, err: io::Error) -> FileError {
    match err.kind() {
        io::ErrorKind::NotFound => FileError::NotFound(path.display().to_string()),
        _ => FileError::IoError(err),
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, FileError> {
    let file = File::open(path).map_err(|err| not_found(path, err))?;
    Ok(csv::ReaderBuilder::new().flexible(true).from_reader(file))
}

fn trimmed_headers(reader: &mut csv::Reader<File>) -> Result<Vec<String>, FileError> {
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

fn to_row(entity: &str, headers: &[String], record: &csv::StringRecord) -> RowData {
    let fields = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| FieldValue {
            name: name.clone(),
            value: record.get(idx).map(cast_cell).unwrap_or(Value::Null),
        })
        .collect();
    RowData::new(entity, fields)
}

fn passes(row: &RowData, watermark: Option<&Watermark>) -> bool {
    match watermark {
        None => true,
        Some(wm) => row
            .get(&wm.column)
            .and_then(|v| v.compare(&wm.value))
            .is_some_and(|ord| ord != Ordering::Less),
    }
}

fn render(row: &RowData, header: &[String]) -> Vec<String> {
    header
        .iter()
        .map(|key| row.get(key).and_then(Value::as_text).unwrap_or_default())
        .collect()
}

fn produce(
    path: &Path,
    entity: &str,
    watermark: Option<&Watermark>,
    batch_size: usize,
    tx: &mpsc::Sender<Chunk>,
    resume: &Receiver<()>,
) {
    let result = (|| -> Result<(), FileError> {
        let mut reader = open_reader(path)?;
        let headers = trimmed_headers(&mut reader)?;
        let mut buffer = Vec::with_capacity(batch_size);

        for record in reader.records() {
            let row = to_row(entity, &headers, &record?);
            if !passes(&row, watermark) {
                continue;
            }
            buffer.push(row);

            if buffer.len() >= batch_size {
                let full = std::mem::replace(&mut buffer, Vec::with_capacity(batch_size));
                if tx.blocking_send(Ok(full)).is_err() || resume.recv().is_err() {
                    // Consumer went away.
                    return Ok(());
                }
            }
        }

        let _ = tx.blocking_send(Ok(buffer));
        Ok(())
    })();

    if let Err(err) = result {
        let _ = tx.blocking_send(Err(err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::BatchCollector;
    use async_trait::async_trait;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    };
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_read_delivers_remainder() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "fish.csv", "id,name\n1,toby\n2,mark\n3,sally\n");

        let mut collector = BatchCollector::default();
        let summary = CsvAdapter::new(2)
            .read(&path, "fish", None, &mut collector)
            .await
            .unwrap();

        let sizes: Vec<usize> = collector.batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(summary.rows, 3);
        assert_eq!(collector.batches[1].offset(), 2);
        assert_eq!(collector.rows()[2].get_value("name"), Value::from("sally"));
        assert_eq!(collector.rows()[0].get_value("id"), Value::Int(1));
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_with_empty_batch() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "fish.csv", "id\n1\n2\n");

        let mut collector = BatchCollector::default();
        CsvAdapter::new(2)
            .read(&path, "fish", None, &mut collector)
            .await
            .unwrap();

        let sizes: Vec<usize> = collector.batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 0]);
    }

    /// Counts rows the producer has parsed ahead of the handler.
    struct SlowHandler {
        handled: Arc<AtomicUsize>,
        max_batch: usize,
    }

    #[async_trait]
    impl BatchHandler for SlowHandler {
        async fn handle(&mut self, batch: RowBatch) -> Result<(), AdapterError> {
            self.max_batch = self.max_batch.max(batch.len());
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.handled.fetch_add(batch.len(), AtomicOrdering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_batches_never_exceed_threshold() {
        let dir = TempDir::new().unwrap();
        let body: String = (1..=25).map(|i| format!("{i}\n")).collect();
        let path = write_file(&dir, "nums.csv", &format!("id\n{body}"));

        let handled = Arc::new(AtomicUsize::new(0));
        let mut handler = SlowHandler {
            handled: handled.clone(),
            max_batch: 0,
        };
        CsvAdapter::new(10)
            .read(&path, "nums", None, &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.max_batch, 10);
        assert_eq!(handled.load(AtomicOrdering::SeqCst), 25);
    }

    #[tokio::test]
    async fn test_handler_error_stops_reading() {
        struct Failing;

        #[async_trait]
        impl BatchHandler for Failing {
            async fn handle(&mut self, _batch: RowBatch) -> Result<(), AdapterError> {
                Err(AdapterError::Handler("nope".into()))
            }
        }

        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "fish.csv", "id\n1\n2\n3\n");
        let err = CsvAdapter::new(1)
            .read(&path, "fish", None, &mut Failing)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Handler(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut collector = BatchCollector::default();
        let err = CsvAdapter::new(2)
            .read(&dir.path().join("nope.csv"), "nope", None, &mut collector)
            .await
            .unwrap_err();
        assert!(err.is_missing_relation());
    }

    #[tokio::test]
    async fn test_write_unions_keys_and_formats_timestamps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let ts = chrono::NaiveDate::from_ymd_opt(2019, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let rows = vec![
            RowData::from_pairs("out", vec![("id", Value::Int(1)), ("seen", Value::Timestamp(ts))]),
            RowData::from_pairs("out", vec![("id", Value::Int(2)), ("name", Value::from("mark"))]),
        ];

        let merged = CsvAdapter::new(10).upsert(&path, "id", &rows).await.unwrap();
        assert_eq!(merged.rows, 2);
        assert_eq!(merged.columns_added, vec!["id", "seen", "name"]);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "id,seen,name\n1,2019-05-06 07:08:09,\n2,,mark\n");
    }

    #[tokio::test]
    async fn test_scan_filters_by_watermark() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "carts.csv", "id,updated_at\n1,5\n2,9\n3,7\n");
        let rows = CsvAdapter::new(10)
            .scan(&path, "carts", Some(Watermark::new("updated_at", Value::Int(7))))
            .await
            .unwrap();
        let ids: Vec<Value> = rows.iter().map(|r| r.get_value("id")).collect();
        assert_eq!(ids, vec![Value::Int(2), Value::Int(3)]);
    }
}
