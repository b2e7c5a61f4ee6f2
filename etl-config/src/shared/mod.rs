//! Configuration sections of a materialization run.

mod base;
mod connection;
mod logging;
mod materializer;
mod merge;
mod pipeline;
mod reconciliation;
mod tools;

pub use base::ValidationError;
pub use connection::{SourceConfig, WarehouseConfig, WarehouseConfigWithoutSecrets};
pub use logging::LoggingConfig;
pub use materializer::MaterializerConfig;
pub use merge::{
    HiveMergeConfig, LocalWarehouseConfig, MergeConfig, MergeEngine, StagingLayoutConfig,
};
pub use pipeline::{
    AbortPolicy, ExternalCommandConfig, PipelineConfig, StageSwitches, TableFilterConfig,
};
pub use reconciliation::ReconciliationConfig;
pub use tools::{ComparatorConfig, DdlGeneratorConfig, EnvVar, ToolsConfig};
