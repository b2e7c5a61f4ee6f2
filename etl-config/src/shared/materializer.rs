use serde::Deserialize;

use crate::Config;
use crate::shared::{
    LoggingConfig, MergeConfig, PipelineConfig, ReconciliationConfig, SourceConfig, ToolsConfig,
    ValidationError, WarehouseConfig,
};

/// Run configuration of the materializer.
///
/// Loaded once at start up and shared read-only with every component of a run.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking the
/// connection passwords.
#[derive(Clone, Debug, Deserialize)]
pub struct MaterializerConfig {
    pub source: SourceConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MaterializerConfig {
    /// Validates every section, returning the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.warehouse.validate()?;
        self.tools.validate()?;
        self.pipeline.validate()?;
        self.merge.validate()?;
        self.reconciliation.validate()
    }
}

impl Config for MaterializerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["reconciliation.mismatch_exit_codes"];
}
