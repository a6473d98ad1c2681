use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use pv_core::{Dataset, DatasetId};
use tracing::{debug, error, info, warn};

use crate::config::{DiscoveryConfig, FileManifest, ManifestEntry, TabPreferences};
use crate::schema::analyze;
use crate::sources::csv_source::parse_csv;

/// Read access to the static origin hosting shared files
///
/// A missing resource or a non-success response is `Ok(None)`; errors are
/// reserved for transport failures. Callers treat both as "absent".
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch a resource as text
    async fn fetch_text(&self, path: &str) -> anyhow::Result<Option<String>>;

    /// Check that a resource exists without reading it
    async fn exists(&self, path: &str) -> bool;
}

/// Serves resources from a local directory
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative resource path, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ResourceFetcher for DirectoryFetcher {
    async fn fetch_text(&self, path: &str) -> anyhow::Result<Option<String>> {
        let Some(full_path) = self.resolve(path) else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(&full_path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Some(full_path) => tokio::fs::metadata(&full_path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        }
    }
}

/// A shared file found during discovery
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFile {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
}

impl From<ManifestEntry> for DiscoveredFile {
    fn from(entry: ManifestEntry) -> Self {
        let display_name = entry
            .display_name
            .unwrap_or_else(|| Dataset::default_display_name(&entry.name));
        Self {
            name: entry.name,
            display_name,
            description: entry.description,
        }
    }
}

/// Loads the shared datasets and tab preferences from a static origin
pub struct SharedFileLoader<F> {
    fetcher: F,
    config: DiscoveryConfig,
}

impl<F: ResourceFetcher> SharedFileLoader<F> {
    pub fn new(fetcher: F, config: DiscoveryConfig) -> Self {
        Self { fetcher, config }
    }

    /// Work out which shared CSV files are available.
    ///
    /// A published manifest wins; entries that do not exist are skipped.
    /// Without one, the configured and common file names are probed. A
    /// manifest that cannot be read falls back to the known names unchecked.
    pub async fn discover(&self) -> Vec<DiscoveredFile> {
        let manifest_text = match self.fetcher.fetch_text(&self.config.manifest_file).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to load file manifest, using automatic discovery: {}", e);
                None
            }
        };

        match manifest_text.map(|text| FileManifest::from_json(&text)) {
            Some(Ok(manifest)) => {
                info!("Loaded file manifest with {} files", manifest.files.len());
                let mut discovered = Vec::new();
                for entry in manifest.files {
                    if self.fetcher.exists(&entry.name).await {
                        discovered.push(DiscoveredFile::from(entry));
                    } else {
                        warn!("File listed in manifest but not found: {}", entry.name);
                    }
                }
                discovered
            }
            Some(Err(e)) => {
                warn!("Failed to read file manifest, using known files: {}", e);
                self.config
                    .known_files
                    .iter()
                    .cloned()
                    .map(|name| DiscoveredFile::from(ManifestEntry::new(name)))
                    .collect()
            }
            None => {
                let candidates = self.config.probe_candidates();
                debug!("No file manifest found, testing {} potential file names", candidates.len());
                let mut discovered = Vec::new();
                for name in candidates {
                    if self.fetcher.exists(&name).await {
                        debug!("Discovered: {}", name);
                        discovered.push(DiscoveredFile::from(ManifestEntry::new(name)));
                    }
                }
                if discovered.is_empty() {
                    info!("No CSV files found in data directory");
                } else {
                    info!("Auto-discovered {} CSV files", discovered.len());
                }
                discovered
            }
        }
    }

    /// Fetch, parse and analyze every discovered file.
    ///
    /// Files that fail to load are logged and left out; this never fails.
    pub async fn load_shared_files(&self) -> Vec<Dataset> {
        let discovered = self.discover().await;
        let mut datasets = Vec::with_capacity(discovered.len());

        for file in discovered {
            let text = match self.fetcher.fetch_text(&file.name).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    error!("Failed to load {}: not found", file.name);
                    continue;
                }
                Err(e) => {
                    error!("Error loading shared file {}: {}", file.name, e);
                    continue;
                }
            };

            let rows = match parse_csv(&text) {
                Ok(rows) => rows,
                Err(e) => {
                    error!("Error parsing shared file {}: {}", file.name, e);
                    continue;
                }
            };

            debug!("Parsed {} rows from {}", rows.len(), file.name);
            let analysis = analyze(&rows);
            datasets.push(Dataset {
                id: DatasetId::shared(&file.name),
                name: file.name,
                display_name: file.display_name,
                rows,
                analysis,
                is_shared: true,
            });
        }

        info!("Loaded {} shared files total", datasets.len());
        datasets
    }

    /// Read the tab preferences document; defaults when absent or unreadable
    pub async fn load_preferences(&self) -> TabPreferences {
        match self.fetcher.fetch_text(&self.config.preferences_file).await {
            Ok(Some(text)) => match TabPreferences::from_json(&text) {
                Ok(preferences) => {
                    info!("Loaded global tab preferences ({} ordered tabs)", preferences.tab_order.len());
                    preferences
                }
                Err(e) => {
                    warn!("Failed to parse global tab preferences: {}", e);
                    TabPreferences::default()
                }
            },
            Ok(None) => {
                debug!("No global tab preferences found, using defaults");
                TabPreferences::default()
            }
            Err(e) => {
                warn!("Failed to load global tab preferences: {}", e);
                TabPreferences::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fetcher over a fixed set of documents
    struct StaticFetcher {
        documents: HashMap<String, String>,
        broken: Vec<String>,
    }

    impl StaticFetcher {
        fn new(documents: &[(&str, &str)]) -> Self {
            Self {
                documents: documents.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                broken: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ResourceFetcher for StaticFetcher {
        async fn fetch_text(&self, path: &str) -> anyhow::Result<Option<String>> {
            if self.broken.iter().any(|b| b == path) {
                anyhow::bail!("connection reset");
            }
            Ok(self.documents.get(path).cloned())
        }

        async fn exists(&self, path: &str) -> bool {
            self.documents.contains_key(path)
        }
    }

    #[tokio::test]
    async fn test_manifest_entries_that_exist_are_loaded() {
        let fetcher = StaticFetcher::new(&[
            ("file-manifest.json", r#"{"files": [{"name": "a.csv", "displayName": "Alpha"}, "missing.csv"]}"#),
            ("a.csv", "name,score\nAcme,3\n"),
        ]);
        let loader = SharedFileLoader::new(fetcher, DiscoveryConfig::default());

        let datasets = loader.load_shared_files().await;
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].id.as_str(), "shared-a.csv");
        assert_eq!(datasets[0].display_name, "Alpha");
        assert!(datasets[0].is_shared);
        assert_eq!(datasets[0].analysis.total_rows, 1);
    }

    #[tokio::test]
    async fn test_probes_names_without_manifest() {
        let fetcher = StaticFetcher::new(&[
            ("leads.csv", "email\na@b.com\n"),
            ("Known.csv", "x\n1\n"),
        ]);
        let config = DiscoveryConfig {
            known_files: vec!["Known.csv".into()],
            ..Default::default()
        };
        let loader = SharedFileLoader::new(fetcher, config);

        let discovered = loader.discover().await;
        let names: Vec<_> = discovered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Known.csv", "leads.csv"]);
        assert_eq!(discovered[1].display_name, "leads");
    }

    #[tokio::test]
    async fn test_broken_files_are_skipped() {
        let mut fetcher = StaticFetcher::new(&[
            ("file-manifest.json", r#"{"files": ["ok.csv", "empty.csv", "down.csv"]}"#),
            ("ok.csv", "a\n1\n"),
            ("empty.csv", "a\n"),
            ("down.csv", "a\n1\n"),
        ]);
        fetcher.broken.push("down.csv".into());
        let loader = SharedFileLoader::new(fetcher, DiscoveryConfig::default());

        let datasets = loader.load_shared_files().await;
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].name, "ok.csv");
    }

    #[tokio::test]
    async fn test_preferences_default_when_absent_or_malformed() {
        let loader = SharedFileLoader::new(StaticFetcher::new(&[]), DiscoveryConfig::default());
        assert!(loader.load_preferences().await.is_empty());

        let loader = SharedFileLoader::new(
            StaticFetcher::new(&[("tab-preferences.json", "{not json")]),
            DiscoveryConfig::default(),
        );
        assert!(loader.load_preferences().await.is_empty());
    }

    #[tokio::test]
    async fn test_directory_fetcher_reads_files_and_refuses_escapes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();
        let fetcher = DirectoryFetcher::new(dir.path());

        assert!(fetcher.exists("a.csv").await);
        assert_eq!(fetcher.fetch_text("a.csv").await.unwrap().as_deref(), Some("x\n1\n"));
        assert_eq!(fetcher.fetch_text("b.csv").await.unwrap(), None);
        assert_eq!(fetcher.fetch_text("../a.csv").await.unwrap(), None);
        assert!(!fetcher.exists("/etc/passwd").await);
    }
}
