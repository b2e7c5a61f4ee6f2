//! Collapsing staged change events into the current state of a table.

mod executor;
mod key;
pub mod partition;
mod plan;
pub mod reducer;
pub mod stream;

pub use executor::{MergeBackend, MergeExecutor, MergeSummary, merge_tables};
pub use key::KeyTuple;
pub use plan::{MergePlan, MergePlanner, StagingLayout};
pub use reducer::{ReduceStats, Reducer, reduce_sorted};
pub use stream::{ReducerSpec, reduce_stream};
