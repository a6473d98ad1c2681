//! Dataset summary statistics

use std::fmt;

use pv_core::{Analysis, ColumnType};

/// Column counts shown above a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetStats {
    pub total_rows: usize,
    pub total_columns: usize,
    pub json_columns: usize,
    pub string_columns: usize,
    pub number_columns: usize,
    pub date_columns: usize,
    pub boolean_columns: usize,
}

impl DatasetStats {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        let count = |kind: ColumnType| analysis.data_types.values().filter(|t| **t == kind).count();
        Self {
            total_rows: analysis.total_rows,
            total_columns: analysis.total_columns,
            json_columns: analysis.json_columns.len(),
            string_columns: count(ColumnType::String),
            number_columns: count(ColumnType::Number),
            date_columns: count(ColumnType::Date),
            boolean_columns: count(ColumnType::Boolean),
        }
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows, {} columns ({} JSON, {} text, {} number, {} date, {} boolean)",
            self.total_rows,
            self.total_columns,
            self.json_columns,
            self.string_columns,
            self.number_columns,
            self.date_columns,
            self.boolean_columns
        )
    }
}
