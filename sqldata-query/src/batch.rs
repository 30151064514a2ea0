//! Batched writes.
//!
//! [`BatchWriter`] splits a save or append into bounded batches and sends
//! them one after another, in arrival order. Each batch is encoded as its
//! own [`RowTable`](crate::table::RowTable) and the per-batch counters are
//! summed into one [`SaveInfo`].
//!
//! A save that received no items still sends one empty batch, so the server
//! sees every save call. Delete keys go out in a single request after the
//! last batch.

use tracing::debug;

use crate::codec::{Encodable, encode_rows_with};
use crate::error::{QueryError, QueryResult};
use crate::table::{RowTable, SaveInfo, SaveRequest};
use crate::traits::BoxFuture;
use crate::value::Record;

/// Default number of items per batch.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Which write endpoint a batch goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Insert or update by key.
    Save,
    /// Insert only.
    Append,
}

impl WriteMode {
    /// Endpoint path segment.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Append => "append-data",
        }
    }
}

/// Destination of write batches.
pub trait WriteSink: Send + Sync {
    /// Send one write request and return the server's counters.
    fn write(&self, mode: WriteMode, request: SaveRequest) -> BoxFuture<'_, QueryResult<SaveInfo>>;
}

/// Progress callback, called with each batch's counters.
pub type ProgressFn<'a> = Box<dyn FnMut(&SaveInfo) + Send + 'a>;

/// Options for a batched write.
pub struct WriteOptions<'a> {
    batch_size: usize,
    on_progress: Option<ProgressFn<'a>>,
}

impl Default for WriteOptions<'_> {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            on_progress: None,
        }
    }
}

impl<'a> WriteOptions<'a> {
    /// Options with the default batch size and no callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of items per batch. Zero is rejected when the write runs.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Call `f` after every insert/update batch.
    pub fn on_progress(mut self, f: impl FnMut(&SaveInfo) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for WriteOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteOptions")
            .field("batch_size", &self.batch_size)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Position and column list of one flushed batch.
struct Batch<'c> {
    mode: WriteMode,
    index: usize,
    columns: &'c [String],
}

/// Splits writes into batches and sends them through a [`WriteSink`].
pub struct BatchWriter<'s, S: WriteSink + ?Sized> {
    sink: &'s S,
}

impl<'s, S: WriteSink + ?Sized> BatchWriter<'s, S> {
    /// Create a writer over `sink`.
    pub fn new(sink: &'s S) -> Self {
        Self { sink }
    }

    /// Save `items` in batches, then delete `items_to_delete` in one request.
    pub async fn save<I, It>(
        &self,
        items: It,
        items_to_delete: Vec<Record>,
        options: WriteOptions<'_>,
    ) -> QueryResult<SaveInfo>
    where
        I: Encodable,
        It: IntoIterator<Item = I>,
    {
        let mut total = self.run(WriteMode::Save, items, options).await?;

        if !items_to_delete.is_empty() {
            let count = items_to_delete.len() as u64;
            debug!(keys = count, "Sending delete keys");
            self.sink
                .write(
                    WriteMode::Save,
                    SaveRequest {
                        table_data: RowTable::default(),
                        items_to_delete,
                    },
                )
                .await?;
            total.deleted = count;
        }

        Ok(total)
    }

    /// Append `items` in batches. Only `inserted` is accumulated.
    pub async fn append<I, It>(&self, items: It, options: WriteOptions<'_>) -> QueryResult<SaveInfo>
    where
        I: Encodable,
        It: IntoIterator<Item = I>,
    {
        self.run(WriteMode::Append, items, options).await
    }

    async fn run<I, It>(
        &self,
        mode: WriteMode,
        items: It,
        mut options: WriteOptions<'_>,
    ) -> QueryResult<SaveInfo>
    where
        I: Encodable,
        It: IntoIterator<Item = I>,
    {
        let batch_size = options.batch_size;
        if batch_size == 0 {
            return Err(QueryError::invalid_batch_size(batch_size));
        }

        let mut total = SaveInfo::default();
        let mut buffer: Vec<I> = Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE));
        // Fixed by the first item for the whole call.
        let mut columns: Option<Vec<String>> = None;
        let mut batches = 0usize;

        for item in items {
            if columns.is_none() {
                columns = Some(item.column_names());
            }
            buffer.push(item);
            if buffer.len() >= batch_size {
                let batch = Batch {
                    mode,
                    index: batches,
                    columns: columns.as_deref().unwrap_or_default(),
                };
                self.flush(batch, &mut buffer, &mut total, &mut options).await?;
                batches += 1;
            }
        }

        if !buffer.is_empty() || batches == 0 {
            let batch = Batch {
                mode,
                index: batches,
                columns: columns.as_deref().unwrap_or_default(),
            };
            self.flush(batch, &mut buffer, &mut total, &mut options).await?;
            batches += 1;
        }

        debug!(
            mode = ?mode,
            batches,
            inserted = total.inserted,
            updated = total.updated,
            "Batched write finished"
        );
        Ok(total)
    }

    async fn flush<I: Encodable>(
        &self,
        batch: Batch<'_>,
        buffer: &mut Vec<I>,
        total: &mut SaveInfo,
        options: &mut WriteOptions<'_>,
    ) -> QueryResult<()> {
        let Batch {
            mode,
            index,
            columns,
        } = batch;
        let table = if buffer.is_empty() {
            RowTable::default()
        } else {
            encode_rows_with(columns, buffer)?
        };
        buffer.clear();

        debug!(mode = ?mode, batch = index, rows = table.len(), "Sending batch");
        let info = self
            .sink
            .write(
                mode,
                SaveRequest {
                    table_data: table,
                    items_to_delete: Vec::new(),
                },
            )
            .await?;

        total.inserted += info.inserted;
        if mode == WriteMode::Save {
            total.updated += info.updated;
        }

        if let Some(on_progress) = options.on_progress.as_mut() {
            on_progress(&info);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        mode: WriteMode,
        rows: usize,
        deletes: usize,
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Call>>,
    }

    impl WriteSink for RecordingSink {
        fn write(
            &self,
            mode: WriteMode,
            request: SaveRequest,
        ) -> BoxFuture<'_, QueryResult<SaveInfo>> {
            let rows = request.table_data.len();
            self.calls.lock().push(Call {
                mode,
                rows,
                deletes: request.items_to_delete.len(),
            });
            Box::pin(async move {
                Ok(SaveInfo {
                    inserted: rows as u64,
                    updated: 1,
                    deleted: 0,
                })
            })
        }
    }

    fn items(n: usize) -> Vec<Record> {
        (0..n).map(|i| record! { "Id" => i as i64 }).collect()
    }

    #[tokio::test]
    async fn test_batch_counts() {
        let batch_size = 3;
        for n in [0, 1, batch_size - 1, batch_size, batch_size + 1, 2 * batch_size] {
            let sink = RecordingSink::default();
            let writer = BatchWriter::new(&sink);

            let info = writer
                .save(items(n), Vec::new(), WriteOptions::new().batch_size(batch_size))
                .await
                .unwrap();

            let calls = sink.calls.lock().clone();
            let expected = n.div_ceil(batch_size).max(1);
            assert_eq!(calls.len(), expected, "n = {}", n);
            assert_eq!(info.inserted, n as u64);
            assert_eq!(info.updated, expected as u64);
            assert_eq!(calls.iter().map(|c| c.rows).sum::<usize>(), n);
        }
    }

    #[tokio::test]
    async fn test_progress_reports_each_batch() {
        let sink = RecordingSink::default();
        let mut seen = Vec::new();

        BatchWriter::new(&sink)
            .append(
                items(5),
                WriteOptions::new()
                    .batch_size(2)
                    .on_progress(|info| seen.push(info.inserted)),
            )
            .await
            .unwrap();

        assert_eq!(seen, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_append_ignores_updated() {
        let sink = RecordingSink::default();
        let info = BatchWriter::new(&sink)
            .append(items(4), WriteOptions::new().batch_size(2))
            .await
            .unwrap();

        assert_eq!(info, SaveInfo::inserted(4));
        assert!(sink.calls.lock().iter().all(|c| c.mode == WriteMode::Append));
    }

    #[tokio::test]
    async fn test_deletes_sent_after_batches() {
        let sink = RecordingSink::default();
        let deletes = vec![record! { "Id" => 1 }, record! { "Id" => 2 }];

        let info = BatchWriter::new(&sink)
            .save(Vec::<Record>::new(), deletes, WriteOptions::new())
            .await
            .unwrap();

        assert_eq!(
            sink.calls.lock().clone(),
            vec![
                Call {
                    mode: WriteMode::Save,
                    rows: 0,
                    deletes: 0
                },
                Call {
                    mode: WriteMode::Save,
                    rows: 0,
                    deletes: 2
                },
            ]
        );
        assert_eq!(info.deleted, 2);
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let sink = RecordingSink::default();
        let err = BatchWriter::new(&sink)
            .save(items(1), Vec::new(), WriteOptions::new().batch_size(0))
            .await
            .unwrap_err();

        assert!(err.is_configuration_error());
        assert!(sink.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_columns_fixed_by_first_item() {
        let sink = RecordingSink::default();
        let rows = vec![
            record! { "Id" => 1, "Name" => "a" },
            record! { "Id" => 2, "Name" => "b" },
            record! { "Id" => 3 },
        ];

        let err = BatchWriter::new(&sink)
            .save(rows, Vec::new(), WriteOptions::new().batch_size(2))
            .await
            .unwrap_err();

        assert_eq!(err.code, crate::error::ErrorCode::MissingField);
        assert_eq!(err.context.field.as_deref(), Some("Name"));
        assert_eq!(sink.calls.lock().len(), 1);
    }
}
