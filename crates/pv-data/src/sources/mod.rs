pub mod csv_source;
pub mod shared_source;

pub use csv_source::{export_csv, export_file_name, parse_csv};
pub use shared_source::{DirectoryFetcher, DiscoveredFile, ResourceFetcher, SharedFileLoader};
