//! Builders and test doubles for materializer tests.
//!
//! Available to the crate's own tests and, with the `test-utils` feature, to integration tests.

pub mod catalog;
pub mod command;
pub mod comparator;
pub mod config;
pub mod event;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod pipeline;
