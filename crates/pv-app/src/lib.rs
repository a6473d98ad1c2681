//! Application state for the prospecting data viewer
//!
//! [`AppController`] owns the working set of datasets and the overlay
//! state, and keeps the persisted session in step with every change.

pub mod config;
pub mod controller;

pub use config::AppConfig;
pub use controller::AppController;

use pv_core::DatasetId;
use pv_data::DataError;
use thiserror::Error;

/// Errors surfaced to the user by controller operations
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Data(#[from] DataError),

    #[error("Shared files cannot be closed. They are loaded from the repository: {0}")]
    SharedDataset(DatasetId),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(DatasetId),

    #[error("No dataset is selected")]
    NoActiveDataset,

    #[error("Invalid name: {0}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
