//! Column type inference for parsed CSV rows

pub mod json;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use pv_core::{Analysis, ColumnType, Row};

pub use json::{format_json, json_preview, safe_json_parse, truncate_text, DEFAULT_TRUNCATE_LENGTH};

/// Share of JSON-looking values (in percent) a column must exceed to be a JSON column
pub const JSON_COLUMN_THRESHOLD: f64 = 50.0;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Schema detector for analyzing rows and determining column types
pub struct SchemaDetector {
    json_threshold: f64,
}

impl SchemaDetector {
    /// Create a new schema detector
    pub fn new() -> Self {
        Self {
            json_threshold: JSON_COLUMN_THRESHOLD,
        }
    }

    /// Set the JSON percentage a column must exceed to count as JSON
    pub fn with_json_threshold(mut self, percent: f64) -> Self {
        self.json_threshold = percent;
        self
    }

    /// Derive the structure summary of a dataset.
    ///
    /// Columns come from the first row; later rows are expected to share
    /// them and are never used to discover new ones.
    pub fn detect(&self, rows: &[Row]) -> Analysis {
        let Some(first) = rows.first() else {
            return Analysis::default();
        };

        let columns: Vec<String> = first.keys().cloned().collect();
        let mut json_columns = Vec::new();
        let mut data_types = IndexMap::with_capacity(columns.len());
        let mut sample_data = IndexMap::with_capacity(columns.len());

        for column in &columns {
            let values: Vec<&str> = rows
                .iter()
                .filter_map(|row| row.get(column))
                .map(String::as_str)
                .filter(|value| !value.is_empty())
                .collect();

            let data_type = self.classify(&values);
            if data_type == ColumnType::Json {
                json_columns.push(column.clone());
            }

            data_types.insert(column.clone(), data_type);
            sample_data.insert(column.clone(), values.first().map(|v| v.to_string()));
        }

        Analysis {
            total_rows: rows.len(),
            total_columns: columns.len(),
            columns,
            json_columns,
            data_types,
            sample_data,
        }
    }

    /// Classify the non-empty values of one column
    pub fn classify(&self, values: &[&str]) -> ColumnType {
        if values.is_empty() {
            return ColumnType::Empty;
        }

        let json_count = values.iter().filter(|v| looks_like_json(v)).count();
        let json_percentage = json_count as f64 / values.len() as f64 * 100.0;

        if json_percentage > self.json_threshold {
            return ColumnType::Json;
        }
        if json_percentage > 0.0 {
            return ColumnType::Mixed;
        }

        // Order matters: numbers, then dates, then booleans
        if values.iter().all(|v| is_numeric(v)) {
            ColumnType::Number
        } else if values.iter().all(|v| is_date(v)) {
            ColumnType::Date
        } else if values.iter().all(|v| is_boolean(v)) {
            ColumnType::Boolean
        } else {
            ColumnType::String
        }
    }
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze rows with the default detector
pub fn analyze(rows: &[Row]) -> Analysis {
    SchemaDetector::new().detect(rows)
}

/// Value is wrapped in a matching `{}` or `[]` pair
pub fn looks_like_json(value: &str) -> bool {
    let trimmed = value.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

/// Value reads as a number literal (decimal, exponent, `Infinity` or radix-prefixed)
pub fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
        }
    }

    let unsigned = trimmed.strip_prefix(|c| c == '+' || c == '-').unwrap_or(trimmed);
    unsigned == "Infinity" || is_decimal_literal(unsigned)
}

fn is_decimal_literal(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(|c| c == 'e' || c == 'E') {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    let digits_ok = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    if !digits_ok(int_part) || !digits_ok(frac_part) {
        return false;
    }

    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(|c| c == '+' || c == '-').unwrap_or(exp);
            !exp.is_empty() && digits_ok(exp)
        }
    }
}

/// Value parses as a calendar date or timestamp
pub fn is_date(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }

    if DateTime::parse_from_rfc3339(trimmed).is_ok() || DateTime::parse_from_rfc2822(trimmed).is_ok() {
        return true;
    }
    if DATE_FORMATS.iter().any(|fmt| NaiveDate::parse_from_str(trimmed, fmt).is_ok()) {
        return true;
    }
    if DATETIME_FORMATS.iter().any(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).is_ok()) {
        return true;
    }

    // Year and month only, e.g. 2024-03
    NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d").is_ok() && trimmed.len() == 7
}

/// Value is `true` or `false` in any case
pub fn is_boolean(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(column: &str, values: &[&str]) -> Vec<Row> {
        values
            .iter()
            .map(|v| {
                let mut row = Row::new();
                row.insert(column.to_string(), v.to_string());
                row
            })
            .collect()
    }

    #[test]
    fn test_empty_input_gives_zero_analysis() {
        let analysis = analyze(&[]);
        assert_eq!(analysis, Analysis::default());
        assert_eq!(analysis.total_rows, 0);
    }

    #[test]
    fn test_columns_follow_first_row_order() {
        let mut first = Row::new();
        first.insert("zeta".into(), "1".into());
        first.insert("alpha".into(), "x".into());
        let mut second = Row::new();
        second.insert("zeta".into(), "2".into());
        second.insert("alpha".into(), "y".into());
        second.insert("extra".into(), "ignored".into());

        let analysis = analyze(&[first, second]);
        assert_eq!(analysis.columns, vec!["zeta", "alpha"]);
        assert_eq!(analysis.total_columns, 2);
        assert_eq!(analysis.total_rows, 2);
        assert_eq!(analysis.data_types.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_numeric_column() {
        let analysis = analyze(&rows("n", &["1", "-2", "3.50", "0"]));
        assert_eq!(analysis.type_of("n"), Some(ColumnType::Number));
    }

    #[test]
    fn test_boolean_column_any_case() {
        let analysis = analyze(&rows("b", &["true", "FALSE", "True"]));
        assert_eq!(analysis.type_of("b"), Some(ColumnType::Boolean));
    }

    #[test]
    fn test_date_column() {
        let analysis = analyze(&rows("d", &["2024-01-05", "2023-12-31T08:30:00Z", "03/14/2022"]));
        assert_eq!(analysis.type_of("d"), Some(ColumnType::Date));
    }

    #[test]
    fn test_number_check_precedes_date_check() {
        let analysis = analyze(&rows("year", &["2021", "2022"]));
        assert_eq!(analysis.type_of("year"), Some(ColumnType::Number));
    }

    #[test]
    fn test_string_column() {
        let analysis = analyze(&rows("s", &["Acme", "42", "true"]));
        assert_eq!(analysis.type_of("s"), Some(ColumnType::String));
    }

    #[test]
    fn test_whitespace_cell_is_present_but_not_numeric() {
        let analysis = analyze(&rows("n", &["1", "   ", "2"]));
        assert_eq!(analysis.type_of("n"), Some(ColumnType::String));
        assert_eq!(analysis.sample_data["n"].as_deref(), Some("1"));

        let blank = analyze(&rows("w", &["  ", " "]));
        assert_eq!(blank.type_of("w"), Some(ColumnType::String));
    }

    #[test]
    fn test_empty_column_has_no_sample() {
        let analysis = analyze(&rows("e", &["", ""]));
        assert_eq!(analysis.type_of("e"), Some(ColumnType::Empty));
        assert_eq!(analysis.sample_data["e"], None);
    }

    #[test]
    fn test_json_threshold_is_strict() {
        let majority = analyze(&rows("j", &["{\"a\":1}", "[1,2]", "plain"]));
        assert_eq!(majority.type_of("j"), Some(ColumnType::Json));
        assert_eq!(majority.json_columns, vec!["j"]);

        let half = analyze(&rows("j", &["{\"a\":1}", "plain"]));
        assert_eq!(half.type_of("j"), Some(ColumnType::Mixed));
        assert!(half.json_columns.is_empty());
    }

    #[test]
    fn test_sample_is_first_non_empty_value() {
        let analysis = analyze(&rows("c", &["", "second", "third"]));
        assert_eq!(analysis.sample_data["c"].as_deref(), Some("second"));
    }

    #[test]
    fn test_missing_cells_are_skipped() {
        let mut full = Row::new();
        full.insert("a".into(), "1".into());
        full.insert("b".into(), "x".into());
        let mut short = Row::new();
        short.insert("a".into(), "2".into());

        let analysis = analyze(&[full, short]);
        assert_eq!(analysis.type_of("a"), Some(ColumnType::Number));
        assert_eq!(analysis.type_of("b"), Some(ColumnType::String));
    }

    #[test]
    fn test_numeric_literals() {
        for value in ["12", "-3.5", ".5", "5.", "1e3", "+7", " 8 ", "Infinity", "0x1F"] {
            assert!(is_numeric(value), "{value} should be numeric");
        }
        for value in ["", "   ", "1,000", "abc", "1.2.3", "e5", "inf", "NaN", "0x"] {
            assert!(!is_numeric(value), "{value} should not be numeric");
        }
    }

    #[test]
    fn test_custom_threshold() {
        let detector = SchemaDetector::new().with_json_threshold(40.0);
        assert_eq!(detector.classify(&["{}", "x"]), ColumnType::Json);
    }
}
