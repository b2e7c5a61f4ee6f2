use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

fn default_ddl_program() -> String {
    DdlGeneratorConfig::DEFAULT_PROGRAM.to_owned()
}

fn default_staging_template() -> String {
    DdlGeneratorConfig::DEFAULT_STAGING_TEMPLATE.to_owned()
}

fn default_base_template() -> String {
    DdlGeneratorConfig::DEFAULT_BASE_TEMPLATE.to_owned()
}

fn default_metadata_template() -> String {
    DdlGeneratorConfig::DEFAULT_METADATA_TEMPLATE.to_owned()
}

fn default_script_dir() -> PathBuf {
    PathBuf::from(DdlGeneratorConfig::DEFAULT_SCRIPT_DIR)
}

fn default_comparator_program() -> String {
    ComparatorConfig::DEFAULT_PROGRAM.to_owned()
}

fn default_comparator_driver() -> String {
    ComparatorConfig::DEFAULT_DRIVER.to_owned()
}

fn default_reducer_command() -> String {
    ToolsConfig::DEFAULT_REDUCER_COMMAND.to_owned()
}

/// External programs invoked by the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ddl_generator: DdlGeneratorConfig,
    #[serde(default)]
    pub comparator: ComparatorConfig,
    /// Command the SQL engine streams sorted staging rows through during a merge job.
    #[serde(default = "default_reducer_command")]
    pub reducer_command: String,
}

impl ToolsConfig {
    pub const DEFAULT_REDUCER_COMMAND: &'static str = "etl-materializer reduce";

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ddl_generator.validate()?;
        self.comparator.validate()?;
        require_non_empty("tools.reducer_command", &self.reducer_command)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ddl_generator: DdlGeneratorConfig::default(),
            comparator: ComparatorConfig::default(),
            reducer_command: default_reducer_command(),
        }
    }
}

/// Template driven DDL generator reading the source catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DdlGeneratorConfig {
    #[serde(default = "default_ddl_program")]
    pub program: String,
    #[serde(default = "default_staging_template")]
    pub staging_template: String,
    #[serde(default = "default_base_template")]
    pub base_template: String,
    /// Template producing the table metadata document consumed by the merge.
    #[serde(default = "default_metadata_template")]
    pub metadata_template: String,
    /// Directory the generated scripts are written to.
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,
}

impl DdlGeneratorConfig {
    pub const DEFAULT_PROGRAM: &'static str = "ddlscan";
    pub const DEFAULT_STAGING_TEMPLATE: &'static str = "ddl-mysql-hive-0.10-staging.vm";
    pub const DEFAULT_BASE_TEMPLATE: &'static str = "ddl-mysql-hive-0.10.vm";
    pub const DEFAULT_METADATA_TEMPLATE: &'static str = "ddl-mysql-hive-metadata.vm";
    pub const DEFAULT_SCRIPT_DIR: &'static str = "/tmp";

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("tools.ddl_generator.program", &self.program)?;
        require_non_empty("tools.ddl_generator.staging_template", &self.staging_template)?;
        require_non_empty("tools.ddl_generator.base_template", &self.base_template)?;
        require_non_empty(
            "tools.ddl_generator.metadata_template",
            &self.metadata_template,
        )
    }
}

impl Default for DdlGeneratorConfig {
    fn default() -> Self {
        Self {
            program: default_ddl_program(),
            staging_template: default_staging_template(),
            base_template: default_base_template(),
            metadata_template: default_metadata_template(),
            script_dir: default_script_dir(),
        }
    }
}

/// Row level comparator checking materialized tables against the source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComparatorConfig {
    #[serde(default = "default_comparator_program")]
    pub program: String,
    /// JDBC driver class the comparator loads for the warehouse side.
    #[serde(default = "default_comparator_driver")]
    pub driver: String,
    /// Extra environment passed to the comparator process, e.g. driver class paths.
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Passes `-verbose` to the comparator.
    #[serde(default)]
    pub verbose: bool,
}

impl ComparatorConfig {
    pub const DEFAULT_PROGRAM: &'static str = "dc";
    pub const DEFAULT_DRIVER: &'static str = "org.apache.hive.jdbc.HiveDriver";

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("tools.comparator.program", &self.program)?;
        for var in &self.env {
            require_non_empty("tools.comparator.env.name", &var.name)?;
        }

        Ok(())
    }
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            program: default_comparator_program(),
            driver: default_comparator_driver(),
            env: Vec::new(),
            verbose: false,
        }
    }
}

/// A single environment variable.
///
/// Kept as a name/value pair because configuration keys are case folded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}
