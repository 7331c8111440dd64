use crate::mapping::{ColumnMapping, MappingSource};
use crate::{SeedError, SeedResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DELIMITER: u8 = b';';
pub const DEFAULT_CHUNK_SIZE: usize = 50;
const SEEDER_SUFFIX: &str = "TableSeeder";
const SEED_DIR: &str = "database/seeds/csvs";

/// Settings for one seed run. Fixed for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedConfig {
    /// Destination table
    pub table: String,
    /// CSV file, plain or compressed
    pub file: PathBuf,
    #[serde(deserialize_with = "de::delimiter")]
    pub delimiter: u8,
    /// Rows to discard before the header (or first data row)
    pub offset_rows: usize,
    /// Records per insert statement
    pub chunk_size: usize,
    pub trim_whitespace: bool,
    /// Column hashed before insert, most likely a password
    pub hashable: Option<String>,
    /// `csv index -> db column` in the order given; when absent the header
    /// row is used. A later pair wins over an earlier one naming the same
    /// column.
    ///
    /// To read only the first, third and fourth columns:
    /// `{"0": "id", "2": "name", "3": "description"}`
    #[serde(deserialize_with = "de::column_mapping")]
    pub column_mapping: Option<Vec<(usize, String)>>,
    /// `encoding_rs` label, e.g. "utf-8" or "windows-1252"
    pub charset: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            table: String::new(),
            file: PathBuf::new(),
            delimiter: DEFAULT_DELIMITER,
            offset_rows: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            trim_whitespace: true,
            hashable: Some("password".to_string()),
            column_mapping: None,
            charset: "utf-8".to_string(),
        }
    }
}

impl SeedConfig {
    /// Defaults for a seeder named e.g. `UserRolesTableSeeder`: table
    /// `user_roles`, file `<base>/database/seeds/csvs/user_roles.csv`.
    pub fn for_seeder(seeder_name: &str, base_path: &Path) -> Self {
        let table = seeder_table_name(seeder_name);
        let file = base_path.join(SEED_DIR).join(format!("{table}.csv"));
        Self {
            table,
            file,
            ..Default::default()
        }
    }

    pub fn from_json_file(path: &Path) -> SeedResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SeedError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| SeedError::Config(format!("{}: {e}", path.display())))
    }

    pub fn mapping_source(&self) -> MappingSource {
        let explicit = self.column_mapping.as_ref().map(|mapping| {
            let pairs = mapping.iter().map(|(index, column)| (*index, column.as_str()));
            ColumnMapping::explicit(pairs)
        });
        MappingSource::from_explicit(explicit)
    }

    pub fn encoding(&self) -> SeedResult<&'static encoding_rs::Encoding> {
        encoding_rs::Encoding::for_label(self.charset.as_bytes())
            .ok_or_else(|| SeedError::Config(format!("unknown charset: {}", self.charset)))
    }

    /// Checks what cannot be defaulted.
    pub fn validate(&self) -> SeedResult<()> {
        if self.table.is_empty() {
            return Err(SeedError::Config("table name is empty".into()));
        }
        if self.file.as_os_str().is_empty() {
            return Err(SeedError::Config("file path is empty".into()));
        }
        self.encoding()?;
        Ok(())
    }
}

/// `UserRolesTableSeeder` -> `user_roles`. Any `::` path prefix is ignored.
fn seeder_table_name(seeder_name: &str) -> String {
    let base = seeder_name.rsplit("::").next().unwrap_or(seeder_name);
    snake_case(&base.replace(SEEDER_SUFFIX, ""))
}

/// Lower-case with `_` before every interior upper-case letter; spaces and
/// dashes become separators.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else if ch.is_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out.trim_end_matches('_').to_string()
}

mod de {
    use serde::de::{Error, MapAccess, Visitor};
    use serde::{Deserialize, Deserializer};
    use std::fmt;

    /// A single-byte delimiter given as a one-character string.
    pub fn delimiter<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(D::Error::custom(format!(
                "delimiter must be a single byte, got {text:?}"
            ))),
        }
    }

    /// A JSON object of `index -> column`, kept in document order.
    pub fn column_mapping<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<(usize, String)>>, D::Error> {
        struct OrderedMapping;

        impl<'de> Visitor<'de> for OrderedMapping {
            type Value = Option<Vec<(usize, String)>>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of csv index to column name, or null")
            }

            fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_some<D: Deserializer<'de>>(self, inner: D) -> Result<Self::Value, D::Error> {
                inner.deserialize_map(self)
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(pair) = map.next_entry::<usize, String>()? {
                    pairs.push(pair);
                }
                Ok(Some(pairs))
            }
        }

        deserializer.deserialize_option(OrderedMapping)
    }
}
