use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

const fn default_partitions() -> usize {
    MergeConfig::DEFAULT_PARTITIONS
}

fn default_operation_column() -> String {
    StagingLayoutConfig::DEFAULT_OPERATION_COLUMN.to_owned()
}

fn default_sequence_column() -> String {
    StagingLayoutConfig::DEFAULT_SEQUENCE_COLUMN.to_owned()
}

fn default_row_id_column() -> String {
    StagingLayoutConfig::DEFAULT_ROW_ID_COLUMN.to_owned()
}

fn default_commit_timestamp_column() -> String {
    StagingLayoutConfig::DEFAULT_COMMIT_TIMESTAMP_COLUMN.to_owned()
}

fn default_table_prefix() -> String {
    StagingLayoutConfig::DEFAULT_TABLE_PREFIX.to_owned()
}

fn default_local_root() -> PathBuf {
    PathBuf::from(LocalWarehouseConfig::DEFAULT_ROOT)
}

fn default_script_path() -> PathBuf {
    PathBuf::from(HiveMergeConfig::DEFAULT_SCRIPT_PATH)
}

fn default_job_log_path() -> PathBuf {
    PathBuf::from(HiveMergeConfig::DEFAULT_LOG_PATH)
}

/// Where a merge runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeEngine {
    /// In-process reduce over a directory backed warehouse.
    #[default]
    Local,
    /// Reduce job submitted to the Hive SQL engine.
    Hive,
}

/// Merge stage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub engine: MergeEngine,
    /// Number of reduce partitions of the local engine.
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    #[serde(default)]
    pub staging: StagingLayoutConfig,
    #[serde(default)]
    pub local: LocalWarehouseConfig,
    #[serde(default)]
    pub hive: HiveMergeConfig,
}

impl MergeConfig {
    pub const DEFAULT_PARTITIONS: usize = 4;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.partitions == 0 {
            return Err(ValidationError::invalid(
                "merge.partitions",
                "must be greater than 0",
            ));
        }

        self.staging.validate()
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            engine: MergeEngine::default(),
            partitions: default_partitions(),
            staging: StagingLayoutConfig::default(),
            local: LocalWarehouseConfig::default(),
            hive: HiveMergeConfig::default(),
        }
    }
}

/// Naming of staged change tables and of their change metadata columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingLayoutConfig {
    #[serde(default = "default_operation_column")]
    pub operation_column: String,
    #[serde(default = "default_sequence_column")]
    pub sequence_column: String,
    #[serde(default = "default_row_id_column")]
    pub row_id_column: String,
    #[serde(default = "default_commit_timestamp_column")]
    pub commit_timestamp_column: String,
    /// Prefix turning a base table name into its staging table name.
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    /// Prefix applied to the schema of staging tables.
    #[serde(default)]
    pub schema_prefix: String,
}

impl StagingLayoutConfig {
    pub const DEFAULT_OPERATION_COLUMN: &'static str = "cdc_operation";
    pub const DEFAULT_SEQUENCE_COLUMN: &'static str = "cdc_sequence_number";
    pub const DEFAULT_ROW_ID_COLUMN: &'static str = "cdc_row_id";
    pub const DEFAULT_COMMIT_TIMESTAMP_COLUMN: &'static str = "cdc_commit_timestamp";
    pub const DEFAULT_TABLE_PREFIX: &'static str = "stage_xxx_";

    /// The four metadata column names, in staged row order.
    pub fn metadata_columns(&self) -> [&str; 4] {
        [
            &self.operation_column,
            &self.sequence_column,
            &self.row_id_column,
            &self.commit_timestamp_column,
        ]
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            "merge.staging.operation_column",
            "merge.staging.sequence_column",
            "merge.staging.row_id_column",
            "merge.staging.commit_timestamp_column",
        ];

        let mut seen = HashSet::new();
        for (field, column) in fields.into_iter().zip(self.metadata_columns()) {
            require_non_empty(field, column)?;
            if !seen.insert(column) {
                return Err(ValidationError::DuplicateStagingColumn(column.to_owned()));
            }
        }

        // Without a prefix a staging table would be its own base table.
        if self.table_prefix.is_empty() && self.schema_prefix.is_empty() {
            return Err(ValidationError::invalid(
                "merge.staging.table_prefix",
                "must not be empty when merge.staging.schema_prefix is empty",
            ));
        }

        Ok(())
    }
}

impl Default for StagingLayoutConfig {
    fn default() -> Self {
        Self {
            operation_column: default_operation_column(),
            sequence_column: default_sequence_column(),
            row_id_column: default_row_id_column(),
            commit_timestamp_column: default_commit_timestamp_column(),
            table_prefix: default_table_prefix(),
            schema_prefix: String::new(),
        }
    }
}

/// Directory backed warehouse of the local engine.
///
/// Staging and materialized tables live side by side under `root`, one directory per schema
/// and table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalWarehouseConfig {
    #[serde(default = "default_local_root")]
    pub root: PathBuf,
}

impl LocalWarehouseConfig {
    pub const DEFAULT_ROOT: &'static str = "data/warehouse";
}

impl Default for LocalWarehouseConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
        }
    }
}

/// Settings of merge jobs submitted to Hive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveMergeConfig {
    /// Path the generated merge script is written to.
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,
    /// Log every submitted script and the engine output are appended to.
    #[serde(default = "default_job_log_path")]
    pub log_path: PathBuf,
    /// File shipped to the engine with `ADD FILE` before the job runs.
    #[serde(default)]
    pub reducer_file: Option<PathBuf>,
}

impl HiveMergeConfig {
    pub const DEFAULT_SCRIPT_PATH: &'static str = "/tmp/materialize.hql";
    pub const DEFAULT_LOG_PATH: &'static str = "materialize.out";
}

impl Default for HiveMergeConfig {
    fn default() -> Self {
        Self {
            script_path: default_script_path(),
            log_path: default_job_log_path(),
            reducer_file: None,
        }
    }
}
