//! Logging setup shared by the materializer binaries and tests.

pub mod tracing;
