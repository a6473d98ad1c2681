//! Table view model

use std::cmp::Ordering;
use std::collections::BTreeMap;

use pv_core::{Analysis, ColumnType, Row};
use pv_data::schema::{json_preview, safe_json_parse, truncate_text, DEFAULT_TRUNCATE_LENGTH};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::links::{render, Rendered};

/// Configuration for table views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Width of a column without a stored width
    pub default_column_width: u32,
    pub min_autofit_width: u32,
    pub max_autofit_width: u32,
    /// Space added around measured text when auto-fitting
    pub autofit_padding: u32,
    /// Estimated width of one character
    pub char_width: u32,
    /// Characters shown in a plain cell before truncation
    pub truncate_length: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_column_width: 150,
            min_autofit_width: 80,
            max_autofit_width: 480,
            autofit_padding: 20,
            char_width: 8,
            truncate_length: DEFAULT_TRUNCATE_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

/// How a single cell should be shown
#[derive(Debug, Clone, PartialEq)]
pub enum CellDisplay {
    Empty,
    /// Structured JSON payload with a one-line summary
    Json { preview: String, pretty: String },
    /// Sanitized HTML; the raw value carried links or markup
    Markup(String),
    Text(String),
}

/// Table over one dataset with its hidden columns and widths applied
pub struct TableView<'a> {
    analysis: &'a Analysis,
    hidden: &'a [String],
    widths: Option<&'a BTreeMap<String, u32>>,
    pub config: TableConfig,
    sort: Option<SortState>,
}

impl<'a> TableView<'a> {
    pub fn new(analysis: &'a Analysis, hidden: &'a [String], widths: Option<&'a BTreeMap<String, u32>>) -> Self {
        Self {
            analysis,
            hidden,
            widths,
            config: TableConfig::default(),
            sort: None,
        }
    }

    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Carry a sort over from a previous view of the same dataset
    pub fn with_sort(mut self, sort: Option<SortState>) -> Self {
        self.sort = sort;
        self
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    /// Columns in analysis order, minus hidden ones
    pub fn visible_columns(&self) -> Vec<&'a str> {
        let hidden = self.hidden;
        self.analysis
            .columns
            .iter()
            .filter(|column| !hidden.contains(*column))
            .map(String::as_str)
            .collect()
    }

    pub fn width_for(&self, column: &str) -> u32 {
        self.widths
            .and_then(|widths| widths.get(column).copied())
            .unwrap_or(self.config.default_column_width)
    }

    /// Sort by a column; sorting the same column again flips the direction
    pub fn sort_by(&mut self, column: &str) -> SortDirection {
        let direction = match &self.sort {
            Some(state) if state.column == column && state.direction == SortDirection::Ascending => {
                SortDirection::Descending
            }
            _ => SortDirection::Ascending,
        };
        debug!("Sorting by {} ({:?})", column, direction);
        self.sort = Some(SortState {
            column: column.to_string(),
            direction,
        });
        direction
    }

    /// Row order for display. Empty cells always sort last.
    pub fn sorted_indices(&self, rows: &[Row]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..rows.len()).collect();
        let Some(sort) = &self.sort else {
            return indices;
        };

        let numeric = self.analysis.type_of(&sort.column) == Some(ColumnType::Number);
        let cell = |index: usize| {
            rows[index]
                .get(&sort.column)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        indices.sort_by(|&a, &b| match (cell(a), cell(b)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => {
                let ordering = compare_cells(left, right, numeric);
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            }
        });
        indices
    }

    /// Width that fits the header and the longest displayed value
    pub fn autofit_width(&self, column: &str, rows: &[Row]) -> u32 {
        let longest = rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(|value| value.chars().count().min(self.config.truncate_length))
            .chain(std::iter::once(column.chars().count()))
            .max()
            .unwrap_or(0);

        let text_width = u32::try_from(longest)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.config.char_width);
        (text_width.saturating_add(self.config.autofit_padding))
            .clamp(self.config.min_autofit_width, self.config.max_autofit_width)
    }

    pub fn cell_display(&self, value: Option<&str>, column: &str) -> CellDisplay {
        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => return CellDisplay::Empty,
        };

        if self.analysis.is_json_column(column) {
            let parsed = safe_json_parse(value);
            if matches!(parsed, Value::Object(_) | Value::Array(_)) {
                let pretty = serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| value.to_string());
                let preview = json_preview(&parsed).unwrap_or_default();
                return CellDisplay::Json { preview, pretty };
            }
        }

        match render(value) {
            Rendered::Markup(html) => CellDisplay::Markup(html),
            Rendered::Plain(text) => CellDisplay::Text(truncate_text(text, self.config.truncate_length).into_owned()),
        }
    }
}

fn compare_cells(left: &str, right: &str, numeric: bool) -> Ordering {
    if numeric {
        if let (Ok(l), Ok(r)) = (left.parse::<f64>(), right.parse::<f64>()) {
            return l.total_cmp(&r);
        }
    }
    left.to_lowercase().cmp(&right.to_lowercase())
}
