use crate::config::SeedConfig;
use crate::hash::{OneWayHash, Sha256Hash};
use crate::mapper::RowMapper;
use crate::report::{ErrorReporter, TracingReporter};
use crate::sink::{BatchSink, SchemaOracle, TableSink};
use crate::source::{open_source, skip_lines};
use crate::SeedError;
use csv_async::{AsyncReaderBuilder, ByteRecord};
use std::sync::Arc;
use tokio::io::BufReader;

/// Counters for one run. All zero when the source could not be opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Physical rows read, offset and header rows included
    pub rows_read: usize,
    pub records_mapped: usize,
    pub records_inserted: usize,
    /// Insert calls made, failed ones included
    pub chunks_flushed: usize,
    pub chunks_failed: usize,
}

impl SeedSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Seeds one table from one CSV file.
///
/// Failures never escape [`CsvSeeder::run`]: they go to the reporter and the
/// run carries on where it can.
pub struct CsvSeeder {
    config: SeedConfig,
    oracle: Arc<dyn SchemaOracle>,
    sink: Arc<dyn TableSink>,
    hasher: Arc<dyn OneWayHash>,
    reporter: Arc<dyn ErrorReporter>,
}

impl CsvSeeder {
    /// `destination` answers schema questions and takes the inserts. Hashing
    /// defaults to unsalted [`Sha256Hash`], reporting to [`TracingReporter`].
    pub fn new<D>(config: SeedConfig, destination: Arc<D>) -> Self
    where
        D: SchemaOracle + TableSink + 'static,
    {
        Self {
            config,
            oracle: destination.clone(),
            sink: destination,
            hasher: Arc::new(Sha256Hash::default()),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn SchemaOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn OneWayHash>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Stream the file into the table.
    pub async fn run(&self) -> SeedSummary {
        let config = &self.config;
        let charset = match config.validate().and_then(|()| config.encoding()) {
            Ok(charset) => charset,
            Err(error) => {
                self.reporter.report(&error);
                return SeedSummary::default();
            }
        };

        let (reader, meta) = match open_source(&config.file, charset).await {
            Ok(opened) => opened,
            Err(error) => {
                self.reporter.report(&error);
                return SeedSummary::default();
            }
        };
        tracing::debug!(
            table = %config.table,
            file = %config.file.display(),
            content_type = %meta.content_type,
            "seeding table from csv"
        );

        // The offset counts physical lines, blank ones included; the CSV
        // reader would silently skip those.
        let mut reader = BufReader::new(reader);
        let mut summary = SeedSummary::default();
        match skip_lines(&mut reader, config.offset_rows).await {
            Ok(skipped) => summary.rows_read = skipped,
            Err(e) => {
                self.reporter.report(&SeedError::Read {
                    path: config.file.clone(),
                    source: e.into(),
                });
                return summary;
            }
        }

        let mut rdr = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(config.delimiter)
            // Larger internal buffer reduces syscalls and allocator churn
            .buffer_capacity(1 << 20) // 1 MiB
            .create_reader(reader);

        let mut mapper =
            RowMapper::new(config, self.oracle.as_ref(), self.hasher.as_ref()).with_offset(0);
        let mut sink = BatchSink::new(
            self.sink.as_ref(),
            self.reporter.as_ref(),
            &config.table,
            &config.file,
            config.chunk_size,
        );

        let mut row = ByteRecord::new();
        loop {
            match rdr.read_byte_record(&mut row).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(source) => {
                    self.reporter.report(&SeedError::Read {
                        path: config.file.clone(),
                        source,
                    });
                    break;
                }
            }
            summary.rows_read += 1;

            if let Some(record) = mapper.map_row(&row).await {
                summary.records_mapped += 1;
                sink.push(record).await;
            }
        }
        sink.finish().await;

        summary.records_inserted = sink.records_inserted();
        summary.chunks_flushed = sink.chunks_flushed();
        summary.chunks_failed = sink.chunks_failed();
        tracing::debug!(table = %config.table, ?summary, "csv seed finished");
        summary
    }
}
