//! Data handling for the prospecting data viewer
//!
//! CSV parsing and structure analysis, shared-file discovery, tab
//! preferences and the quota-aware session store.

pub mod config;
pub mod quota;
pub mod schema;
pub mod session;
pub mod sources;

use thiserror::Error;

// Re-exports
pub use config::{DiscoveryConfig, FileManifest, ManifestEntry, TabPreferences};
pub use quota::{QuotaCheck, StorageInfo};
pub use schema::{analyze, SchemaDetector};
pub use session::{
    FileStore, KeyValueStore, MemoryStore, PersistOutcome, SessionConfig, SessionError,
    SessionManager, SessionRecord, StorageWarning, StoreError, StoredAnalysis, StoredDataset,
};
pub use sources::{export_csv, export_file_name, parse_csv, DirectoryFetcher, ResourceFetcher, SharedFileLoader};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("The CSV file appears to be empty or has no valid data")]
    EmptyDataset,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}
