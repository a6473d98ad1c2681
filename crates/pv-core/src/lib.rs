//! Core data model for the prospecting data viewer
//!
//! This crate holds the dataset and analysis types, the per-dataset overlay
//! state and the event bus shared by the other crates.

pub mod dataset;
pub mod events;
pub mod state;

// Re-export commonly used types
pub use dataset::{Analysis, ColumnType, Dataset, DatasetId, Row};
pub use events::{handler_from_fn, Event, EventBus, EventHandler};
pub use state::{ColumnWidths, HiddenColumns, OverlayState, MIN_COLUMN_WIDTH};
