//! Typed requests for the external tools and the single place they become processes.

pub mod ddl;
pub mod hive;
pub mod provisioning;
mod runner;
mod spec;

pub use ddl::{DdlGenerationRequest, DdlKind, ScriptLoadRequest};
pub use hive::{HiveMergeJob, MergeJobRequest};
pub use provisioning::ProvisioningRequest;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, require_success};
pub use spec::{CommandArg, CommandSpec, OutputTarget};
