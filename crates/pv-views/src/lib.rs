//! Presentation-independent views over loaded datasets

pub mod links;
mod stats;
mod tables;

pub use links::{render, Rendered};
pub use stats::DatasetStats;
pub use tables::{CellDisplay, SortDirection, SortState, TableConfig, TableView};
