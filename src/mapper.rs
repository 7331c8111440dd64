use crate::config::SeedConfig;
use crate::hash::OneWayHash;
use crate::mapping::{ColumnMapping, MappingSource};
use crate::sink::SchemaOracle;
use csv_async::ByteRecord;

/// One CSV row projected onto destination columns.
///
/// Columns keep the order they were first written in; writing a column again
/// replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedRecord {
    fields: Vec<(String, Option<String>)>,
}

impl MappedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    /// Value of `column`; `None` when the column is absent or null.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// No columns, or every column null.
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_none())
    }
}

enum MapperState {
    AwaitingHeader,
    Translating(ColumnMapping),
}

/// Turns raw rows into [`MappedRecord`]s, one row at a time.
///
/// Rows inside the configured offset are discarded. Without an explicit
/// mapping the next row becomes the header; after that the mapping is fixed
/// for the rest of the run.
pub struct RowMapper<'a> {
    table: &'a str,
    oracle: &'a dyn SchemaOracle,
    hasher: &'a dyn OneWayHash,
    hashable: Option<&'a str>,
    trim_whitespace: bool,
    offset_remaining: usize,
    state: MapperState,
}

impl<'a> RowMapper<'a> {
    pub fn new(
        config: &'a SeedConfig,
        oracle: &'a dyn SchemaOracle,
        hasher: &'a dyn OneWayHash,
    ) -> Self {
        let state = match config.mapping_source() {
            MappingSource::Explicit(mapping) => MapperState::Translating(mapping),
            MappingSource::FromHeader => MapperState::AwaitingHeader,
        };
        Self {
            table: &config.table,
            oracle,
            hasher,
            hashable: config.hashable.as_deref().filter(|field| !field.is_empty()),
            trim_whitespace: config.trim_whitespace,
            offset_remaining: config.offset_rows,
            state,
        }
    }

    /// Override the number of rows still to discard, e.g. when the caller
    /// already skipped the offset on the raw byte stream.
    pub fn with_offset(mut self, rows: usize) -> Self {
        self.offset_remaining = rows;
        self
    }

    /// The resolved mapping, once there is one.
    pub fn mapping(&self) -> Option<&ColumnMapping> {
        match &self.state {
            MapperState::Translating(mapping) => Some(mapping),
            MapperState::AwaitingHeader => None,
        }
    }

    /// Feed the next raw row. Returns a record only for data rows that carry
    /// at least one non-null value.
    pub async fn map_row(&mut self, row: &ByteRecord) -> Option<MappedRecord> {
        if self.offset_remaining > 0 {
            self.offset_remaining -= 1;
            return None;
        }

        if let MapperState::AwaitingHeader = self.state {
            let fields: Vec<String> = row
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect();
            let mapping =
                ColumnMapping::from_header(&fields, self.table, self.oracle).await;
            tracing::debug!(
                table = self.table,
                header_fields = fields.len(),
                mapped_columns = mapping.len(),
                "column mapping resolved from header"
            );
            self.state = MapperState::Translating(mapping);
            return None;
        }
        let MapperState::Translating(mapping) = &self.state else {
            return None;
        };

        let mut record = self.translate(row, mapping);
        self.hash_sensitive(&mut record);

        if record.is_blank() {
            return None;
        }
        Some(record)
    }

    /// Column names compare ASCII case-insensitively, the same way the
    /// destinations match header names.
    fn hash_sensitive(&self, record: &mut MappedRecord) {
        let Some(field) = self.hashable else {
            return;
        };
        for (name, value) in record.fields.iter_mut() {
            if !name.eq_ignore_ascii_case(field) {
                continue;
            }
            if let Some(hashed) = value.as_deref().map(|plain| self.hasher.hash(plain)) {
                *value = Some(hashed);
            }
        }
    }

    fn translate(&self, row: &ByteRecord, mapping: &ColumnMapping) -> MappedRecord {
        let mut record = MappedRecord::new();
        for (index, column) in mapping.iter() {
            let value = match row.get(index) {
                None | Some(b"") => None,
                Some(raw) => {
                    let text = String::from_utf8_lossy(raw);
                    if self.trim_whitespace {
                        Some(text.trim().to_string())
                    } else {
                        Some(text.into_owned())
                    }
                }
            };
            record.insert(column, value);
        }
        record
    }
}
