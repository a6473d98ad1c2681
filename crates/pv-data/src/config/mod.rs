//! Static discovery documents and loader configuration

pub mod manifest;
pub mod preferences;

pub use manifest::*;
pub use preferences::*;

use serde::{Deserialize, Serialize};

/// Common CSV file names probed when no manifest is published
pub const COMMON_CSV_NAMES: &[&str] = &[
    "data.csv", "export.csv", "companies.csv", "contacts.csv", "leads.csv",
    "customers.csv", "prospects.csv", "sales.csv", "marketing.csv",
    "users.csv", "products.csv", "orders.csv", "inventory.csv",
    "clients.csv", "partners.csv", "suppliers.csv", "employees.csv",
    "transactions.csv", "revenue.csv", "analytics.csv", "reports.csv",
    "file.csv", "dataset.csv", "table.csv", "list.csv", "records.csv",
];

/// Where the shared-file loader looks for its documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Manifest listing the shared CSV files
    pub manifest_file: String,

    /// Tab order and naming document
    pub preferences_file: String,

    /// File names tried before the common names when no manifest exists
    pub known_files: Vec<String>,

    /// Whether to probe [`COMMON_CSV_NAMES`] without a manifest
    pub probe_common_names: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            manifest_file: "file-manifest.json".to_string(),
            preferences_file: "tab-preferences.json".to_string(),
            known_files: Vec::new(),
            probe_common_names: true,
        }
    }
}

impl DiscoveryConfig {
    /// Candidate names probed when the manifest is missing
    pub fn probe_candidates(&self) -> Vec<String> {
        let mut candidates = self.known_files.clone();
        if self.probe_common_names {
            for name in COMMON_CSV_NAMES {
                if !candidates.iter().any(|c| c == name) {
                    candidates.push(name.to_string());
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_files_come_first_without_duplicates() {
        let config = DiscoveryConfig {
            known_files: vec!["All Companies.csv".into(), "leads.csv".into()],
            ..Default::default()
        };
        let candidates = config.probe_candidates();
        assert_eq!(candidates[0], "All Companies.csv");
        assert_eq!(candidates.iter().filter(|c| c.as_str() == "leads.csv").count(), 1);
        assert_eq!(candidates.len(), COMMON_CSV_NAMES.len() + 1);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DiscoveryConfig = serde_json::from_str(r#"{"probe_common_names": false}"#).unwrap();
        assert_eq!(config.manifest_file, "file-manifest.json");
        assert!(config.probe_candidates().is_empty());
    }
}
