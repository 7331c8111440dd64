use crate::mapper::MappedRecord;
use crate::sink::{SchemaOracle, TableSink};
use crate::SinkError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// One `bulk_insert` as seen by a [`MemoryTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertCall {
    pub table: String,
    pub records: Vec<MappedRecord>,
    pub accepted: bool,
}

/// In-memory destination: declared columns per table and a log of every
/// insert call. Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryTable {
    columns: HashMap<String, HashSet<String>>,
    failing_calls: HashSet<usize>,
    calls: Mutex<Vec<InsertCall>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table. Column names compare case-insensitively.
    pub fn with_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns
            .into_iter()
            .map(|column| column.into().to_ascii_lowercase())
            .collect();
        self.columns.insert(table.to_string(), columns);
        self
    }

    /// Reject the `call`-th insert (1-based).
    pub fn fail_on_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<InsertCall>> {
        match self.calls.lock() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn calls(&self) -> Vec<InsertCall> {
        self.lock().clone()
    }

    /// Record count of every insert call, accepted or not.
    pub fn insert_sizes(&self) -> Vec<usize> {
        self.lock().iter().map(|call| call.records.len()).collect()
    }

    /// Records that made it into `table`.
    pub fn rows(&self, table: &str) -> Vec<MappedRecord> {
        self.lock()
            .iter()
            .filter(|call| call.accepted && call.table == table)
            .flat_map(|call| call.records.iter().cloned())
            .collect()
    }

    fn check_columns(&self, table: &str, records: &[MappedRecord]) -> Result<(), SinkError> {
        let known = self
            .columns
            .get(table)
            .ok_or_else(|| SinkError::Rejected(format!("no such table: {table}")))?;
        for record in records {
            if let Some(column) = record
                .columns()
                .find(|column| !known.contains(&column.to_ascii_lowercase()))
            {
                return Err(SinkError::Rejected(format!(
                    "table {table} has no column named {column}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaOracle for MemoryTable {
    async fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns
            .get(table)
            .is_some_and(|columns| columns.contains(&column.to_ascii_lowercase()))
    }
}

#[async_trait]
impl TableSink for MemoryTable {
    async fn bulk_insert(&self, table: &str, records: &[MappedRecord]) -> Result<(), SinkError> {
        let checked = self.check_columns(table, records);
        let mut calls = self.lock();
        let call = calls.len() + 1;
        let result = if self.failing_calls.contains(&call) {
            Err(SinkError::Rejected(format!("insert call {call} failed")))
        } else {
            checked
        };
        calls.push(InsertCall {
            table: table.to_string(),
            records: records.to_vec(),
            accepted: result.is_ok(),
        });
        result
    }
}
