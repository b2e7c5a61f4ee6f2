use std::fmt;

use etl_config::shared::{AbortPolicy, StageSwitches};

/// A step of a materialization run.
///
/// Stages run one at a time in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Creates the staging tables change events are loaded into.
    StagingDdl,
    /// Creates the materialized tables.
    BaseDdl,
    /// Produces the table catalog every later stage works from.
    MetadataGeneration,
    /// Sets up bulk transfer jobs for the cataloged tables.
    Provisioning,
    /// Materializes every cataloged table from its staged changes.
    Merge,
    /// Compares every materialized table with the source.
    Reconciliation,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::StagingDdl,
        Stage::BaseDdl,
        Stage::MetadataGeneration,
        Stage::Provisioning,
        Stage::Merge,
        Stage::Reconciliation,
    ];

    /// Stages whose output this stage consumes.
    pub fn dependencies(self) -> &'static [Stage] {
        match self {
            Stage::StagingDdl | Stage::BaseDdl | Stage::MetadataGeneration => &[],
            Stage::Provisioning | Stage::Merge | Stage::Reconciliation => {
                &[Stage::MetadataGeneration]
            }
        }
    }

    /// Returns `true` when the stage works on the table catalog.
    pub fn needs_catalog(self) -> bool {
        self.dependencies().contains(&Stage::MetadataGeneration)
    }

    pub fn is_switched_on(self, switches: &StageSwitches) -> bool {
        match self {
            Stage::StagingDdl => switches.staging_ddl,
            Stage::BaseDdl => switches.base_ddl,
            Stage::MetadataGeneration => switches.metadata_generation,
            Stage::Provisioning => switches.provisioning,
            Stage::Merge => switches.merge,
            Stage::Reconciliation => switches.reconciliation,
        }
    }

    pub fn aborts_on_failure(self, policy: &AbortPolicy) -> bool {
        match self {
            Stage::StagingDdl => policy.staging_ddl,
            Stage::BaseDdl => policy.base_ddl,
            Stage::MetadataGeneration => policy.metadata_generation,
            Stage::Provisioning => policy.provisioning,
            Stage::Merge => policy.merge,
            Stage::Reconciliation => policy.reconciliation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::StagingDdl => "staging_ddl",
            Stage::BaseDdl => "base_ddl",
            Stage::MetadataGeneration => "metadata_generation",
            Stage::Provisioning => "provisioning",
            Stage::Merge => "merge",
            Stage::Reconciliation => "reconciliation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
