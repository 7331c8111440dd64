//! Destination capabilities and the chunking sink in front of them.

use crate::mapper::MappedRecord;
use crate::report::ErrorReporter;
use crate::{SeedError, SinkError};
use async_trait::async_trait;
use std::path::Path;

/// Answers "does `table` have `column`?" for header pruning.
#[async_trait]
pub trait SchemaOracle: Send + Sync {
    async fn has_column(&self, table: &str, column: &str) -> bool;
}

/// Receives whole chunks of records. One call is one bulk insert.
#[async_trait]
pub trait TableSink: Send + Sync {
    async fn bulk_insert(&self, table: &str, records: &[MappedRecord]) -> Result<(), SinkError>;
}

/// Records accumulated since the last flush.
#[derive(Debug, Default)]
pub struct Batch {
    records: Vec<MappedRecord>,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: MappedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MappedRecord] {
        &self.records
    }
}

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; no insert call was made.
    Empty,
    Inserted(usize),
    /// The chunk was rejected and its records discarded.
    Failed(usize),
}

impl FlushOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FlushOutcome::Failed(_))
    }
}

/// Buffers mapped records and writes them in chunks of exactly `chunk_size`,
/// plus one final short chunk from [`BatchSink::finish`].
///
/// The batch is swapped for a fresh one before every insert, so a rejected
/// chunk is never queued again.
pub struct BatchSink<'a> {
    sink: &'a dyn TableSink,
    reporter: &'a dyn ErrorReporter,
    table: &'a str,
    file: &'a Path,
    chunk_size: usize,
    batch: Batch,
    records_inserted: usize,
    chunks_flushed: usize,
    chunks_failed: usize,
}

impl<'a> BatchSink<'a> {
    /// A `chunk_size` of zero is treated as one.
    pub fn new(
        sink: &'a dyn TableSink,
        reporter: &'a dyn ErrorReporter,
        table: &'a str,
        file: &'a Path,
        chunk_size: usize,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            sink,
            reporter,
            table,
            file,
            chunk_size,
            batch: Batch::with_capacity(chunk_size),
            records_inserted: 0,
            chunks_flushed: 0,
            chunks_failed: 0,
        }
    }

    /// Queue one record, flushing if the chunk is now full.
    pub async fn push(&mut self, record: MappedRecord) -> Option<FlushOutcome> {
        self.batch.push(record);
        if self.batch.len() < self.chunk_size {
            return None;
        }
        Some(self.flush().await)
    }

    /// Insert whatever is left over.
    pub async fn finish(&mut self) -> FlushOutcome {
        self.flush().await
    }

    async fn flush(&mut self) -> FlushOutcome {
        let batch = std::mem::replace(&mut self.batch, Batch::with_capacity(self.chunk_size));
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let size = batch.len();
        self.chunks_flushed += 1;
        match self.sink.bulk_insert(self.table, batch.records()).await {
            Ok(()) => {
                self.records_inserted += size;
                tracing::debug!(table = self.table, records = size, "chunk inserted");
                FlushOutcome::Inserted(size)
            }
            Err(source) => {
                self.chunks_failed += 1;
                self.reporter.report(&SeedError::InsertFailed {
                    table: self.table.to_string(),
                    file: self.file.to_path_buf(),
                    source,
                });
                FlushOutcome::Failed(size)
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn records_inserted(&self) -> usize {
        self.records_inserted
    }

    pub fn chunks_flushed(&self) -> usize {
        self.chunks_flushed
    }

    pub fn chunks_failed(&self) -> usize {
        self.chunks_failed
    }
}
