//! SQLite destination.

use crate::mapper::MappedRecord;
use crate::sink::{SchemaOracle, TableSink};
use crate::SinkError;
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A SQLite database that can be seeded.
///
/// Each chunk becomes one multi-row `INSERT`, so a chunk lands completely or
/// not at all. Lookups and inserts run on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteTable {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTable {
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run arbitrary SQL, e.g. schema setup before seeding. Blocks the
    /// calling thread.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SinkError> {
        lock(&self.conn)?.execute_batch(sql)?;
        Ok(())
    }

    /// Blocks the calling thread.
    pub fn count_rows(&self, table: &str) -> Result<i64, SinkError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        Ok(lock(&self.conn)?.query_row(&sql, [], |row| row.get(0))?)
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, SinkError> {
    conn.lock().map_err(|_| SinkError::Poisoned)
}

fn lookup_column(conn: &Connection, table: &str, column: &str) -> Result<bool, SinkError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
            [table, column],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_chunk(conn: &Connection, table: &str, records: &[MappedRecord]) -> Result<(), SinkError> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    // Column list comes from the first record; other records bind NULL
    // for anything they lack.
    let columns: Vec<&str> = first.columns().collect();
    if columns.is_empty() {
        return Err(SinkError::Rejected("record has no columns".into()));
    }

    let sql = insert_sql(table, &columns, records.len());
    let columns = &columns;
    let values = records.iter().flat_map(move |record| {
        columns
            .iter()
            .map(move |column| record.value(column).map(str::to_string))
    });

    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

#[async_trait]
impl SchemaOracle for SqliteTable {
    async fn has_column(&self, table: &str, column: &str) -> bool {
        let conn = Arc::clone(&self.conn);
        let (table_name, column_name) = (table.to_string(), column.to_string());
        let found = tokio::task::spawn_blocking(move || {
            lookup_column(&*lock(&conn)?, &table_name, &column_name)
        })
        .await
        .map_err(SinkError::from)
        .and_then(|result| result);

        match found {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    table,
                    column,
                    error = %e,
                    "schema lookup failed; treating column as absent"
                );
                false
            }
        }
    }
}

#[async_trait]
impl TableSink for SqliteTable {
    async fn bulk_insert(&self, table: &str, records: &[MappedRecord]) -> Result<(), SinkError> {
        let conn = Arc::clone(&self.conn);
        let table = table.to_string();
        let records = records.to_vec();
        tokio::task::spawn_blocking(move || insert_chunk(&*lock(&conn)?, &table, &records)).await?
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_sql(table: &str, columns: &[&str], rows: usize) -> String {
    let column_list = columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![placeholders.as_str(); rows].join(", ");
    format!(
        "INSERT INTO {} ({column_list}) VALUES {values}",
        quote_ident(table)
    )
}
