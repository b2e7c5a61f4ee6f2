use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

const fn default_true() -> bool {
    true
}

const fn default_false() -> bool {
    false
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from(PipelineConfig::DEFAULT_METADATA_PATH)
}

fn default_match_all() -> String {
    TableFilterConfig::MATCH_ALL.to_owned()
}

/// Stage sequencing settings of a materialization run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Which stages were requested.
    ///
    /// Stages required by a requested stage run even when switched off here.
    #[serde(default)]
    pub stages: StageSwitches,
    /// Whether a failure of each stage halts the run.
    #[serde(default)]
    pub abort_on_failure: AbortPolicy,
    /// Location of the generated table metadata document.
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,
    /// Command provisioning the bulk transfer jobs for the catalog tables.
    #[serde(default)]
    pub provisioning: Option<ExternalCommandConfig>,
    #[serde(default)]
    pub table_filter: TableFilterConfig,
}

impl PipelineConfig {
    pub const DEFAULT_METADATA_PATH: &'static str = "/tmp/meta.json";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.metadata_path.as_os_str().is_empty() {
            return Err(ValidationError::invalid(
                "pipeline.metadata_path",
                "must not be empty",
            ));
        }

        match &self.provisioning {
            Some(command) => command.validate()?,
            None if self.stages.provisioning => {
                return Err(ValidationError::MissingProvisioningCommand);
            }
            None => {}
        }

        require_non_empty("pipeline.table_filter.schema", &self.table_filter.schema)?;
        require_non_empty("pipeline.table_filter.table", &self.table_filter.table)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: StageSwitches::default(),
            abort_on_failure: AbortPolicy::default(),
            metadata_path: default_metadata_path(),
            provisioning: None,
            table_filter: TableFilterConfig::default(),
        }
    }
}

/// Per stage enable switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSwitches {
    #[serde(default = "default_true")]
    pub staging_ddl: bool,
    #[serde(default = "default_true")]
    pub base_ddl: bool,
    #[serde(default = "default_true")]
    pub metadata_generation: bool,
    /// Off unless a provisioning command is configured.
    #[serde(default = "default_false")]
    pub provisioning: bool,
    #[serde(default = "default_true")]
    pub merge: bool,
    #[serde(default = "default_true")]
    pub reconciliation: bool,
}

impl StageSwitches {
    /// Every stage switched off.
    pub const fn none() -> Self {
        Self {
            staging_ddl: false,
            base_ddl: false,
            metadata_generation: false,
            provisioning: false,
            merge: false,
            reconciliation: false,
        }
    }
}

impl Default for StageSwitches {
    fn default() -> Self {
        Self {
            staging_ddl: true,
            base_ddl: true,
            metadata_generation: true,
            provisioning: false,
            merge: true,
            reconciliation: true,
        }
    }
}

/// Per stage abort policy. `true` halts the run when the stage fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortPolicy {
    #[serde(default = "default_true")]
    pub staging_ddl: bool,
    #[serde(default = "default_true")]
    pub base_ddl: bool,
    #[serde(default = "default_true")]
    pub metadata_generation: bool,
    #[serde(default = "default_true")]
    pub provisioning: bool,
    #[serde(default = "default_true")]
    pub merge: bool,
    /// Reconciliation failures are reported without halting by default.
    #[serde(default = "default_false")]
    pub reconciliation: bool,
}

impl AbortPolicy {
    /// Policy recording every failure and carrying on.
    pub const fn continue_on_error() -> Self {
        Self {
            staging_ddl: false,
            base_ddl: false,
            metadata_generation: false,
            provisioning: false,
            merge: false,
            reconciliation: false,
        }
    }
}

impl Default for AbortPolicy {
    fn default() -> Self {
        Self {
            staging_ddl: true,
            base_ddl: true,
            metadata_generation: true,
            provisioning: true,
            merge: true,
            reconciliation: false,
        }
    }
}

/// An external program and its fixed arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExternalCommandConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("pipeline.provisioning.program", &self.program)
    }
}

/// Restricts the tables of a run by schema and table name.
///
/// Patterns are exact names or `*` globs; `.*` is accepted as match-all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilterConfig {
    #[serde(default = "default_match_all")]
    pub schema: String,
    #[serde(default = "default_match_all")]
    pub table: String,
}

impl TableFilterConfig {
    pub const MATCH_ALL: &'static str = "*";
}

impl Default for TableFilterConfig {
    fn default() -> Self {
        Self {
            schema: default_match_all(),
            table: default_match_all(),
        }
    }
}
