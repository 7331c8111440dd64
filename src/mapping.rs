use crate::sink::SchemaOracle;

const UTF8_BOM: char = '\u{feff}';

/// Strip a UTF-8 byte-order mark from the start of a string.
pub fn strip_utf8_bom(text: &str) -> &str {
    text.strip_prefix(UTF8_BOM).unwrap_or(text)
}

/// Ordered `source index -> destination column` pairs.
///
/// Indices always refer to positions in the physical row; pruning a column
/// removes its pair but never shifts the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<(usize, String)>,
}

impl ColumnMapping {
    /// Mapping supplied by the caller. Order is kept as given and duplicate
    /// destination names are allowed.
    pub fn explicit<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(index, column)| (index, column.into()))
                .collect(),
        }
    }

    /// Adopt a header row as the mapping, dropping every field the
    /// destination table has no column for.
    pub async fn from_header(fields: &[String], table: &str, oracle: &dyn SchemaOracle) -> Self {
        let mut columns = Vec::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            let name = if index == 0 {
                strip_utf8_bom(field)
            } else {
                field.as_str()
            };
            if oracle.has_column(table, name).await {
                columns.push((index, name.to_string()));
            } else {
                tracing::debug!(
                    table,
                    column = name,
                    index,
                    "skipping csv column missing from table"
                );
            }
        }
        Self { columns }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.columns
            .iter()
            .map(|(index, column)| (*index, column.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Where the mapping for a run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    Explicit(ColumnMapping),
    /// First row after the offset names the columns.
    FromHeader,
}

impl MappingSource {
    /// An empty explicit mapping means "read the header".
    pub fn from_explicit(mapping: Option<ColumnMapping>) -> Self {
        match mapping {
            Some(mapping) if !mapping.is_empty() => MappingSource::Explicit(mapping),
            _ => MappingSource::FromHeader,
        }
    }
}
