//! JSON cell helpers

use std::borrow::Cow;

use serde_json::Value;

/// Character limit applied to plain table cells
pub const DEFAULT_TRUNCATE_LENGTH: usize = 100;

/// Parse a cell as JSON, falling back to the original text.
///
/// "Not JSON" is the common case for mixed columns, so failures are not
/// reported; the input comes back as `Value::String`.
pub fn safe_json_parse(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Pretty-print objects and arrays (two-space indent), including strings
/// that hold a serialized object or array. Anything else is shown as is.
pub fn format_json(value: &Value) -> String {
    match value {
        Value::String(text) => match safe_json_parse(text) {
            parsed @ (Value::Object(_) | Value::Array(_)) => pretty(&parsed).unwrap_or_else(|| text.clone()),
            _ => text.clone(),
        },
        Value::Object(_) | Value::Array(_) => pretty(value).unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> Option<String> {
    serde_json::to_string_pretty(value).ok()
}

/// Shorten text to `limit` characters, appending `...` when cut
pub fn truncate_text(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        None => Cow::Borrowed(text),
        Some((byte_end, _)) => Cow::Owned(format!("{}...", &text[..byte_end])),
    }
}

/// One-line summary shown in a table cell instead of a JSON payload
pub fn json_preview(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::Array(links)) = map.get("links") {
                    return Some(format!("Show all information ({} links)", links.len()));
                }
            }
            Some(format!("Show all information ({} fields)", map.len()))
        }
        Value::Array(items) => Some(format!("{} items", items.len())),
        _ => None,
    }
}
