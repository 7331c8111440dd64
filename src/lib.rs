//! Streaming CSV seeding for relational tables.
//!
//! - Source: local files, plain or gzip/zstd (detected from content, not the
//!   extension), any `encoding_rs` charset.
//! - Mapping: header-derived (pruned against the destination schema) or
//!   explicit `index -> column`.
//! - Sink: records are inserted in chunks; a failing chunk is reported and
//!   dropped, the run keeps going.
//!
//! Data shape:
//! - `MappedRecord`: ordered `column -> Option<String>`
//! - `SeedSummary { rows_read, records_mapped, records_inserted, chunks_flushed, chunks_failed }`
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod codec;
mod config;
mod hash;
mod mapper;
mod mapping;
mod memory;
mod report;
mod seeder;
mod sink;
mod source;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use crate::config::{snake_case, SeedConfig, DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITER};
pub use crate::hash::{OneWayHash, Sha256Hash};
pub use crate::mapper::{MappedRecord, RowMapper};
pub use crate::mapping::{strip_utf8_bom, ColumnMapping, MappingSource};
pub use crate::memory::{InsertCall, MemoryTable};
pub use crate::report::{CollectingReporter, ErrorReporter, TracingReporter};
pub use crate::seeder::{CsvSeeder, SeedSummary};
pub use crate::sink::{Batch, BatchSink, FlushOutcome, SchemaOracle, TableSink};
pub use crate::source::{
    build_csv_reader, detect_content_type, open_source, skip_lines, SourceMeta, SourceReader,
};
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub use crate::sqlite::SqliteTable;

use std::path::PathBuf;
use thiserror::Error;

/// Everything a seed run can report. None of these abort a run; they reach the
/// caller through an [`ErrorReporter`].
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("CSV insert failed: {} does not exist or is not readable ({source})", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV insert failed: {source} - file: {}", file.display())]
    InsertFailed {
        table: String,
        file: PathBuf,
        #[source]
        source: SinkError,
    },
    #[error("CSV read failed: {source} - file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv_async::Error,
    },
    #[error("invalid seed configuration: {0}")]
    Config(String),
}

/// Failures raised by a destination table.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("insert rejected: {0}")]
    Rejected(String),
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("destination connection lock poisoned")]
    Poisoned,
    #[error("destination task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;
