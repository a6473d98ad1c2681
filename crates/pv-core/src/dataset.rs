//! Dataset and analysis types shared by every crate

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single CSV record: column name to raw cell text, in header order.
pub type Row = IndexMap<String, String>;

/// Opaque dataset identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh identifier for a user-uploaded dataset
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Identifier for a dataset loaded from the shared data directory
    pub fn shared(file_name: &str) -> Self {
        Self(format!("shared-{}", file_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DatasetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Inferred semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Empty,
    Json,
    Mixed,
    Number,
    Date,
    Boolean,
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Empty => "empty",
            ColumnType::Json => "json",
            ColumnType::Mixed => "mixed",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::String => "string",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived summary of a dataset's structure
///
/// `columns` follows the key order of the dataset's rows. The analysis is
/// never patched in place; it is recomputed whenever column names change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    /// Columns classified as carrying JSON payloads, in column order
    pub json_columns: Vec<String>,
    pub data_types: IndexMap<String, ColumnType>,
    /// First non-empty value per column
    pub sample_data: IndexMap<String, Option<String>>,
}

impl Analysis {
    pub fn is_json_column(&self, column: &str) -> bool {
        self.json_columns.iter().any(|c| c == column)
    }

    pub fn type_of(&self, column: &str) -> Option<ColumnType> {
        self.data_types.get(column).copied()
    }
}

/// One loaded CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub id: DatasetId,
    /// Original file name
    pub name: String,
    /// User-editable tab label
    pub display_name: String,
    pub rows: Vec<Row>,
    pub analysis: Analysis,
    /// Loaded from the shared data directory; cannot be closed by the user
    pub is_shared: bool,
}

impl Dataset {
    /// Label used when no custom name has been chosen
    pub fn default_display_name(name: &str) -> String {
        name.strip_suffix(".csv").unwrap_or(name).to_string()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_custom_name(&self) -> bool {
        self.display_name != Self::default_display_name(&self.name)
    }

    /// Rename a column in every row, keeping its position.
    ///
    /// Returns `false` when the column does not exist or the new name is
    /// already taken. The analysis is left stale; callers recompute it.
    pub fn rename_column_in_rows(&mut self, old: &str, new: &str) -> bool {
        if old == new || !self.analysis.columns.iter().any(|c| c == old) {
            return false;
        }
        if self.analysis.columns.iter().any(|c| c == new) {
            return false;
        }

        for row in &mut self.rows {
            if let Some(index) = row.get_index_of(old) {
                let value = row.shift_remove_index(index).map(|(_, v)| v).unwrap_or_default();
                row.shift_insert(index, new.to_string(), value);
            }
        }
        true
    }
}
