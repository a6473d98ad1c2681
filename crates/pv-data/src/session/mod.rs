//! Quota-aware persistence of the user's session
//!
//! Datasets and overlay state are written to a size-limited key-value store
//! under a fixed set of prefixed keys. When the store fills up, older
//! datasets are given up first and the caller gets a [`StorageWarning`].

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

use std::fmt;

use indexmap::IndexMap;
use pv_core::{ColumnType, ColumnWidths, Dataset, DatasetId, HiddenColumns, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::quota::{entry_size, QuotaCheck, StorageInfo, DEFAULT_QUOTA_LIMIT};
use crate::schema::analyze;

const FILES_KEY: &str = "files";
const ACTIVE_FILE_KEY: &str = "active_file";
const HIDDEN_COLUMNS_KEY: &str = "hidden_columns";
const COLUMN_WIDTHS_KEY: &str = "column_widths";
const AUTHENTICATED_KEY: &str = "authenticated";

/// Datasets kept when the store refuses a write outright
const KEEP_MOST_RECENT: usize = 2;

/// Session persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prefix of every key the session owns
    pub key_prefix: String,
    /// Logical quota used for the pre-write projection, in bytes
    pub quota_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_prefix: "prospecting".to_string(),
            quota_limit: DEFAULT_QUOTA_LIMIT,
        }
    }
}

/// Analysis fields kept in storage; the rest is recomputed on restore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub columns: Vec<String>,
    pub data_types: IndexMap<String, ColumnType>,
    pub row_count: usize,
    pub column_count: usize,
}

/// Compressed dataset record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDataset {
    pub id: DatasetId,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub analysis: Option<StoredAnalysis>,
}

impl From<&Dataset> for StoredDataset {
    fn from(dataset: &Dataset) -> Self {
        Self {
            id: dataset.id.clone(),
            name: dataset.name.clone(),
            display_name: dataset.display_name.clone(),
            data: Some(dataset.rows.clone()),
            analysis: Some(StoredAnalysis {
                columns: dataset.analysis.columns.clone(),
                data_types: dataset.analysis.data_types.clone(),
                row_count: dataset.analysis.total_rows,
                column_count: dataset.analysis.total_columns,
            }),
        }
    }
}

impl StoredDataset {
    /// Rebuild a full dataset, re-analyzing its rows. `None` without row data.
    pub fn into_dataset(self) -> Option<Dataset> {
        let rows = self.data?;
        let analysis = analyze(&rows);
        Some(Dataset {
            id: self.id,
            name: self.name,
            display_name: self.display_name,
            rows,
            analysis,
            is_shared: false,
        })
    }
}

/// Everything [`SessionManager::load`] restores
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecord {
    pub datasets: Vec<StoredDataset>,
    pub active_file_id: Option<DatasetId>,
    pub hidden_columns: HiddenColumns,
    pub column_widths: ColumnWidths,
}

/// Datasets were dropped to fit the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageWarning {
    /// The projection was over quota and the oldest dataset was left out
    OldestRemoved { name: String, remaining: usize },
    /// The store refused the write and only the most recent datasets were kept
    ReducedToRecent { removed: usize, kept: usize },
}

impl fmt::Display for StorageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageWarning::OldestRemoved { name, remaining } => write!(
                f,
                "Storage limit reached. Oldest file ({name}) was removed to make space. {remaining} files are still saved."
            ),
            StorageWarning::ReducedToRecent { removed, kept } => write!(
                f,
                "Storage limit exceeded. {removed} files removed, only the {kept} most recent files were kept."
            ),
        }
    }
}

/// Result of a successful persist
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    pub warning: Option<StorageWarning>,
    /// Datasets actually written
    pub files_saved: usize,
    pub files_removed: usize,
}

/// A persist that could not be completed
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to save data: {0}")]
    WriteFailed(String),
}

impl From<StoreError> for SessionError {
    fn from(error: StoreError) -> Self {
        SessionError::WriteFailed(error.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        SessionError::WriteFailed(error.to_string())
    }
}

/// Serialized values of the four session keys
struct Payload {
    files: String,
    active_file: String,
    hidden_columns: String,
    column_widths: String,
}

impl Payload {
    fn encode(
        files: &[StoredDataset],
        active_file_id: Option<&DatasetId>,
        hidden_columns: &HiddenColumns,
        column_widths: &ColumnWidths,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            files: serde_json::to_string(files)?,
            active_file: active_file_id.map(|id| id.as_str().to_string()).unwrap_or_default(),
            hidden_columns: serde_json::to_string(hidden_columns)?,
            column_widths: serde_json::to_string(column_widths)?,
        })
    }

    fn entries(&self) -> [(&'static str, &str); 4] {
        [
            (FILES_KEY, self.files.as_str()),
            (ACTIVE_FILE_KEY, self.active_file.as_str()),
            (HIDDEN_COLUMNS_KEY, self.hidden_columns.as_str()),
            (COLUMN_WIDTHS_KEY, self.column_widths.as_str()),
        ]
    }
}

/// Reads and writes the session through a [`KeyValueStore`]
pub struct SessionManager<S> {
    store: S,
    config: SessionConfig,
}

impl<S: KeyValueStore> SessionManager<S> {
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.config.key_prefix, suffix)
    }

    /// Persist datasets and overlay state, degrading when storage runs out.
    ///
    /// Datasets are expected oldest first.
    pub fn persist<'a, I>(
        &self,
        datasets: I,
        active_file_id: Option<&DatasetId>,
        hidden_columns: &HiddenColumns,
        column_widths: &ColumnWidths,
    ) -> Result<PersistOutcome, SessionError>
    where
        I: IntoIterator<Item = &'a Dataset>,
    {
        let mut files: Vec<StoredDataset> = datasets.into_iter().map(StoredDataset::from).collect();
        let payload = Payload::encode(&files, active_file_id, hidden_columns, column_widths)?;
        let check = self.quota_check(&payload)?;

        info!(
            files = files.len(),
            files_size = payload.files.len(),
            current_size = check.current_size,
            estimated_new_size = check.estimated_new_size,
            quota_limit = check.quota_limit,
            "Saving session data"
        );

        if check.is_near_quota {
            warn!(
                "Approaching storage quota: {} of {} bytes",
                check.estimated_new_size, check.quota_limit
            );
        }

        if check.would_exceed_quota && files.len() > 1 {
            let oldest = files.remove(0);
            warn!("Storage quota would be exceeded, removing oldest file: {}", oldest.name);

            let reduced = Payload::encode(&files, active_file_id, hidden_columns, column_widths)?;
            return match self.write(&reduced) {
                Ok(()) => Ok(PersistOutcome {
                    warning: Some(StorageWarning::OldestRemoved {
                        name: oldest.display_name,
                        remaining: files.len(),
                    }),
                    files_saved: files.len(),
                    files_removed: 1,
                }),
                Err(e) => self.recover(e, &files, 1, active_file_id, hidden_columns, column_widths),
            };
        }

        match self.write(&payload) {
            Ok(()) => {
                debug!("Session data saved ({} files)", files.len());
                Ok(PersistOutcome {
                    warning: None,
                    files_saved: files.len(),
                    files_removed: 0,
                })
            }
            Err(e) => self.recover(e, &files, 0, active_file_id, hidden_columns, column_widths),
        }
    }

    /// Last attempt after the store refused a write: keep only the most recent datasets.
    ///
    /// `already_removed` counts datasets dropped from `files` before this call.
    fn recover(
        &self,
        error: StoreError,
        files: &[StoredDataset],
        already_removed: usize,
        active_file_id: Option<&DatasetId>,
        hidden_columns: &HiddenColumns,
        column_widths: &ColumnWidths,
    ) -> Result<PersistOutcome, SessionError> {
        if !error.is_quota_exceeded() || files.len() <= 1 {
            error!("Failed to save session data: {}", error);
            return Err(error.into());
        }

        let start = files.len().saturating_sub(KEEP_MOST_RECENT);
        let recent = &files[start..];
        warn!(
            "Storage quota exceeded, keeping only the {} most recent files",
            recent.len()
        );

        let payload = Payload::encode(recent, active_file_id, hidden_columns, column_widths)?;
        if let Err(e) = self.write(&payload) {
            error!("Failed to save session data after removing files: {}", e);
            return Err(e.into());
        }

        let removed = start + already_removed;
        Ok(PersistOutcome {
            warning: Some(StorageWarning::ReducedToRecent {
                removed,
                kept: recent.len(),
            }),
            files_saved: recent.len(),
            files_removed: removed,
        })
    }

    /// Write each key in turn; an earlier key stays written if a later one fails
    fn write(&self, payload: &Payload) -> Result<(), StoreError> {
        for (suffix, value) in payload.entries() {
            self.store.set(&self.key(suffix), value)?;
        }
        Ok(())
    }

    fn quota_check(&self, payload: &Payload) -> Result<QuotaCheck, StoreError> {
        let sizes: IndexMap<String, usize> = self.store.entries()?.into_iter().collect();
        let current_size: usize = sizes.iter().map(|(k, v)| k.len() + v).sum();

        let mut replaced = 0;
        let mut incoming = 0;
        for (suffix, value) in payload.entries() {
            let key = self.key(suffix);
            if let Some(existing) = sizes.get(&key) {
                replaced += key.len() + existing;
            }
            incoming += entry_size(&key, value);
        }

        Ok(QuotaCheck::project(current_size, replaced, incoming, self.config.quota_limit))
    }

    /// Restore the persisted session; anything unreadable takes its default
    pub fn load(&self) -> SessionRecord {
        let datasets: Vec<StoredDataset> = self.read_json(FILES_KEY).unwrap_or_default();
        let active_file_id = match self.store.get(&self.key(ACTIVE_FILE_KEY)) {
            Ok(value) => value.filter(|v| !v.is_empty()).map(DatasetId::from),
            Err(e) => {
                warn!("Failed to read active file: {}", e);
                None
            }
        };
        let hidden_columns: HiddenColumns = self.read_json(HIDDEN_COLUMNS_KEY).unwrap_or_default();
        let column_widths: ColumnWidths = self.read_json(COLUMN_WIDTHS_KEY).unwrap_or_default();

        if datasets.is_empty() {
            debug!("No saved session data found");
            return SessionRecord::default();
        }
        if datasets.iter().any(|d| d.data.is_none()) {
            warn!("Saved session data is incomplete, starting fresh");
            return SessionRecord::default();
        }

        info!("Loaded {} files from session", datasets.len());
        SessionRecord {
            datasets,
            active_file_id,
            hidden_columns,
            column_widths,
        }
    }

    fn read_json<T: DeserializeOwned>(&self, suffix: &str) -> Option<T> {
        let key = self.key(suffix);
        match self.store.get(&key) {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring malformed session key {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read session key {}: {}", key, e);
                None
            }
        }
    }

    /// Remove every key the session owns. Failures are logged, never raised.
    pub fn clear(&self) {
        for suffix in [
            FILES_KEY,
            ACTIVE_FILE_KEY,
            HIDDEN_COLUMNS_KEY,
            COLUMN_WIDTHS_KEY,
            AUTHENTICATED_KEY,
        ] {
            if let Err(e) = self.store.remove(&self.key(suffix)) {
                error!("Failed to clear session key {}: {}", suffix, e);
            }
        }
        info!("Session data cleared");
    }

    pub fn persist_auth(&self, authenticated: bool) {
        if let Err(e) = self
            .store
            .set(&self.key(AUTHENTICATED_KEY), if authenticated { "true" } else { "false" })
        {
            error!("Failed to save authentication state: {}", e);
        }
    }

    /// Whether the user is logged in; false on any read failure
    pub fn load_auth(&self) -> bool {
        self.read_json::<bool>(AUTHENTICATED_KEY).unwrap_or(false)
    }

    pub fn clear_auth(&self) {
        if let Err(e) = self.store.remove(&self.key(AUTHENTICATED_KEY)) {
            error!("Failed to clear authentication state: {}", e);
        }
    }

    pub fn storage_info(&self) -> StorageInfo {
        let current_size = self.store.total_size().unwrap_or_else(|e| {
            warn!("Failed to measure storage usage: {}", e);
            0
        });
        StorageInfo::new(current_size, self.config.quota_limit)
    }
}
