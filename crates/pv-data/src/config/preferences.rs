//! Tab order and naming shared by every user of a data directory

use std::collections::BTreeMap;
use std::path::Path;

use pv_core::{Dataset, DatasetId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DataError;

/// Global tab preferences for shared datasets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabPreferences {
    /// Desired tab order by dataset id
    #[serde(default)]
    pub tab_order: Vec<DatasetId>,

    /// Custom display names by dataset id
    #[serde(default)]
    pub tab_names: BTreeMap<DatasetId, String>,

    #[serde(default = "now_rfc3339")]
    pub last_updated: String,
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for TabPreferences {
    fn default() -> Self {
        Self {
            tab_order: Vec::new(),
            tab_names: BTreeMap::new(),
            last_updated: now_rfc3339(),
        }
    }
}

impl TabPreferences {
    pub fn from_json(text: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn is_empty(&self) -> bool {
        self.tab_order.is_empty() && self.tab_names.is_empty()
    }

    /// Reorder datasets by `tab_order` and apply custom names.
    ///
    /// Datasets missing from the order keep their relative position after
    /// the ordered ones. Nothing changes when no order is recorded.
    pub fn apply(&self, mut datasets: Vec<Dataset>) -> Vec<Dataset> {
        if self.tab_order.is_empty() {
            debug!("No global preferences to apply, using default order");
            return datasets;
        }

        let position = |id: &DatasetId| {
            self.tab_order
                .iter()
                .position(|ordered| ordered == id)
                .unwrap_or(usize::MAX)
        };
        datasets.sort_by_key(|dataset| position(&dataset.id));

        for dataset in &mut datasets {
            if let Some(name) = self.tab_names.get(&dataset.id) {
                debug!("Applying custom name to {}: \"{}\"", dataset.id, name);
                dataset.display_name = name.clone();
            }
        }

        info!("Applied global preferences to {} files", datasets.len());
        datasets
    }

    /// Capture the current order and any non-default names
    pub fn generate(datasets: &[Dataset]) -> Self {
        let preferences = Self {
            tab_order: datasets.iter().map(|d| d.id.clone()).collect(),
            tab_names: datasets
                .iter()
                .filter(|d| d.has_custom_name())
                .map(|d| (d.id.clone(), d.display_name.clone()))
                .collect(),
            last_updated: now_rfc3339(),
        };

        debug!(
            tab_order = preferences.tab_order.len(),
            custom_names = preferences.tab_names.len(),
            "Generated preferences"
        );
        preferences
    }

    /// Write the document as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Preferences saved to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::Analysis;

    fn dataset(id: &str, name: &str) -> Dataset {
        Dataset {
            id: DatasetId::new(id),
            name: name.to_string(),
            display_name: Dataset::default_display_name(name),
            rows: Vec::new(),
            analysis: Analysis::default(),
            is_shared: true,
        }
    }

    #[test]
    fn test_apply_orders_known_ids_first() {
        let preferences = TabPreferences {
            tab_order: vec![DatasetId::new("c"), DatasetId::new("a")],
            tab_names: [(DatasetId::new("a"), "Alpha".to_string())].into_iter().collect(),
            ..Default::default()
        };

        let applied = preferences.apply(vec![
            dataset("a", "a.csv"),
            dataset("b", "b.csv"),
            dataset("c", "c.csv"),
            dataset("d", "d.csv"),
        ]);

        let ids: Vec<_> = applied.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b", "d"]);
        assert_eq!(applied[1].display_name, "Alpha");
        assert_eq!(applied[0].display_name, "c");
    }

    #[test]
    fn test_empty_order_is_a_no_op() {
        let preferences = TabPreferences {
            tab_names: [(DatasetId::new("b"), "Bee".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let applied = preferences.apply(vec![dataset("b", "b.csv"), dataset("a", "a.csv")]);
        assert_eq!(applied[0].id.as_str(), "b");
        assert_eq!(applied[0].display_name, "b");
    }

    #[test]
    fn test_generate_keeps_only_custom_names() {
        let mut renamed = dataset("x", "x.csv");
        renamed.display_name = "Prospects".to_string();
        let preferences = TabPreferences::generate(&[renamed, dataset("y", "y.csv")]);

        assert_eq!(preferences.tab_order.len(), 2);
        assert_eq!(preferences.tab_names.len(), 1);
        assert_eq!(preferences.tab_names[&DatasetId::new("x")], "Prospects");
    }

    #[test]
    fn test_parses_document() {
        let preferences = TabPreferences::from_json(
            r#"{"tabOrder": ["shared-a.csv"], "tabNames": {"shared-a.csv": "A"}, "lastUpdated": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(preferences.tab_order, vec![DatasetId::new("shared-a.csv")]);
        assert_eq!(preferences.last_updated, "2024-01-01T00:00:00Z");
    }
}
