//! Table descriptors and the metadata document they are loaded from.

mod descriptor;
mod filter;
mod loader;

pub use descriptor::{ColumnDescriptor, TableDescriptor};
pub use filter::TableFilter;
pub use loader::{LoadedCatalog, load_catalog, load_catalog_file};
