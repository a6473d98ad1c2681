//! Per-dataset UI overlay state

use std::collections::BTreeMap;

use crate::DatasetId;

/// Narrowest width a column can be dragged to
pub const MIN_COLUMN_WIDTH: u32 = 60;

/// Hidden columns per dataset, in the order they were hidden
pub type HiddenColumns = BTreeMap<DatasetId, Vec<String>>;

/// Pixel widths per dataset and column
pub type ColumnWidths = BTreeMap<DatasetId, BTreeMap<String, u32>>;

/// Selection and per-dataset view preferences
///
/// Every map is keyed by dataset id. Callers must prune entries with
/// [`OverlayState::retain_datasets`] or [`OverlayState::remove_dataset`]
/// whenever a dataset goes away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    pub active_file_id: Option<DatasetId>,
    pub hidden_columns: HiddenColumns,
    pub column_widths: ColumnWidths,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh, empty overlay for a newly added dataset
    pub fn register_dataset(&mut self, id: &DatasetId) {
        self.hidden_columns.insert(id.clone(), Vec::new());
        self.column_widths.insert(id.clone(), BTreeMap::new());
    }

    pub fn is_hidden(&self, id: &DatasetId, column: &str) -> bool {
        self.hidden_columns
            .get(id)
            .map(|hidden| hidden.iter().any(|c| c == column))
            .unwrap_or(false)
    }

    pub fn hidden_for(&self, id: &DatasetId) -> &[String] {
        self.hidden_columns.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn widths_for(&self, id: &DatasetId) -> Option<&BTreeMap<String, u32>> {
        self.column_widths.get(id)
    }

    pub fn width_of(&self, id: &DatasetId, column: &str) -> Option<u32> {
        self.column_widths.get(id).and_then(|w| w.get(column)).copied()
    }

    /// Flip a column between hidden and visible. Returns the new hidden state.
    pub fn toggle_column(&mut self, id: &DatasetId, column: &str) -> bool {
        let hidden = self.hidden_columns.entry(id.clone()).or_default();
        if let Some(pos) = hidden.iter().position(|c| c == column) {
            hidden.remove(pos);
            false
        } else {
            hidden.push(column.to_string());
            true
        }
    }

    /// Store a column width, clamped to [`MIN_COLUMN_WIDTH`]. Returns the stored width.
    pub fn set_column_width(&mut self, id: &DatasetId, column: &str, width: u32) -> u32 {
        let width = width.max(MIN_COLUMN_WIDTH);
        self.column_widths
            .entry(id.clone())
            .or_default()
            .insert(column.to_string(), width);
        width
    }

    /// Carry a column's hidden flag and width over to its new name
    pub fn rename_column(&mut self, id: &DatasetId, old: &str, new: &str) {
        if let Some(widths) = self.column_widths.get_mut(id) {
            if let Some(width) = widths.remove(old) {
                widths.insert(new.to_string(), width);
            }
        }
        if let Some(hidden) = self.hidden_columns.get_mut(id) {
            for column in hidden.iter_mut().filter(|c| c.as_str() == old) {
                *column = new.to_string();
            }
        }
    }

    /// Drop every entry belonging to a dataset
    pub fn remove_dataset(&mut self, id: &DatasetId) {
        self.hidden_columns.remove(id);
        self.column_widths.remove(id);
        if self.active_file_id.as_ref() == Some(id) {
            self.active_file_id = None;
        }
    }

    /// Keep only entries whose dataset id is in `ids`
    pub fn retain_datasets<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a DatasetId>,
    {
        let keep: Vec<&DatasetId> = ids.into_iter().collect();
        self.hidden_columns.retain(|id, _| keep.contains(&id));
        self.column_widths.retain(|id, _| keep.contains(&id));
        if let Some(active) = &self.active_file_id {
            if !keep.contains(&active) {
                self.active_file_id = None;
            }
        }
    }

    /// Clear selection and view preferences but keep nothing else
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_column_round_trip() {
        let mut state = OverlayState::new();
        let id = DatasetId::new("a");

        assert!(state.toggle_column(&id, "email"));
        assert!(state.is_hidden(&id, "email"));
        assert!(!state.toggle_column(&id, "email"));
        assert!(!state.is_hidden(&id, "email"));
    }

    #[test]
    fn test_width_is_clamped() {
        let mut state = OverlayState::new();
        let id = DatasetId::new("a");

        assert_eq!(state.set_column_width(&id, "name", 12), MIN_COLUMN_WIDTH);
        assert_eq!(state.set_column_width(&id, "name", 240), 240);
        assert_eq!(state.width_of(&id, "name"), Some(240));
    }

    #[test]
    fn test_rename_moves_width_and_hidden_flag() {
        let mut state = OverlayState::new();
        let id = DatasetId::new("a");
        state.set_column_width(&id, "old", 200);
        state.toggle_column(&id, "old");

        state.rename_column(&id, "old", "new");

        assert_eq!(state.width_of(&id, "old"), None);
        assert_eq!(state.width_of(&id, "new"), Some(200));
        assert!(state.is_hidden(&id, "new"));
        assert!(!state.is_hidden(&id, "old"));
    }

    #[test]
    fn test_retain_prunes_unknown_ids() {
        let mut state = OverlayState::new();
        let a = DatasetId::new("a");
        let b = DatasetId::new("b");
        state.register_dataset(&a);
        state.register_dataset(&b);
        state.active_file_id = Some(b.clone());

        state.retain_datasets([&a]);

        assert!(state.hidden_columns.contains_key(&a));
        assert!(!state.hidden_columns.contains_key(&b));
        assert!(!state.column_widths.contains_key(&b));
        assert_eq!(state.active_file_id, None);
    }
}
