//! Storage of staged and materialized tables.

mod base;
pub mod codec;
pub mod local;
pub mod memory;

pub use base::Warehouse;
pub use local::{LocalWarehouse, VERSION_POINTER};
pub use memory::MemoryWarehouse;
