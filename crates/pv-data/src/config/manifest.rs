//! Manifest of shared CSV files published next to the data

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::DataError;

/// One shared file listed in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawManifestEntry", rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Manifests may list bare file names or full entries
#[derive(Deserialize)]
#[serde(untagged)]
enum RawManifestEntry {
    Name(String),
    #[serde(rename_all = "camelCase")]
    Full {
        name: String,
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<RawManifestEntry> for ManifestEntry {
    fn from(raw: RawManifestEntry) -> Self {
        match raw {
            RawManifestEntry::Name(name) => ManifestEntry::new(name),
            RawManifestEntry::Full { name, display_name, description } => ManifestEntry {
                name,
                display_name,
                description,
            },
        }
    }
}

impl ManifestEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
        }
    }
}

/// File list document read by the shared-file loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileManifest {
    pub files: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl FileManifest {
    pub fn from_json(text: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(text)?)
    }

    /// List the `.csv` files of a directory, sorted by name
    pub fn scan_dir(dir: &Path) -> Result<Self, DataError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".csv") {
                names.push(name);
            }
        }
        names.sort();

        Ok(Self {
            files: names.into_iter().map(ManifestEntry::new).collect(),
            last_updated: Some(chrono::Utc::now().to_rfc3339()),
        })
    }

    /// Write the manifest as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Updated files list with {} CSV files: {}", self.files.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_names_and_entries() {
        let manifest = FileManifest::from_json(
            r#"{"files": ["a.csv", {"name": "b.csv", "displayName": "Bee", "description": "second"}]}"#,
        )
        .unwrap();

        assert_eq!(manifest.files[0], ManifestEntry::new("a.csv"));
        assert_eq!(manifest.files[1].display_name.as_deref(), Some("Bee"));
        assert_eq!(manifest.files[1].description.as_deref(), Some("second"));
    }

    #[test]
    fn test_scan_dir_lists_sorted_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let manifest = FileManifest::scan_dir(dir.path()).unwrap();
        let names: Vec<_> = manifest.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);

        let path = dir.path().join("file-manifest.json");
        manifest.save(&path).unwrap();
        let reloaded = FileManifest::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded, manifest);
    }
}
