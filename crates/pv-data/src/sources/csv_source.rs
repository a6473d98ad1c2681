use csv::{ReaderBuilder, WriterBuilder};
use pv_core::Row;
use tracing::{debug, warn};

use crate::DataError;

/// Parse CSV text into header-keyed rows.
///
/// The first record is the header. Empty lines are skipped, short records
/// leave their trailing cells absent and surplus fields are dropped. A
/// document without any data row is an error.
pub fn parse_csv(text: &str) -> Result<Vec<Row>, DataError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(DataError::EmptyDataset);
    }

    let mut rows = Vec::new();
    let mut ragged = 0usize;

    for result in reader.records() {
        let record = result?;
        if record.len() != headers.len() {
            ragged += 1;
        }

        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }

    if ragged > 0 {
        warn!("CSV parsing warnings: {} records did not match the header width", ragged);
    }
    if rows.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    debug!("Parsed {} rows with {} columns", rows.len(), headers.len());
    Ok(rows)
}

/// Serialize rows back to CSV text in the given column order
pub fn export_csv(rows: &[Row], columns: &[String]) -> Result<String, DataError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| row.get(c).map(String::as_str).unwrap_or("")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DataError::Other(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DataError::Other(e.to_string()))
}

/// File name offered when exporting a dataset
pub fn export_file_name(name: &str) -> String {
    format!("processed_{}", name)
}
