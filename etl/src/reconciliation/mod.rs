//! Row level comparison of materialized tables against the source.

pub mod comparator;
mod driver;

pub use comparator::{
    CommandComparator, Comparator, ComparisonEndpoint, ComparisonOutcome, ComparisonRequest,
};
pub use driver::{ReconciliationDriver, ReconciliationReport};
