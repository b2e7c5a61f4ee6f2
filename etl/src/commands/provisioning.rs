use std::path::PathBuf;

use etl_config::shared::ExternalCommandConfig;

use crate::commands::spec::CommandSpec;

/// Asks the bulk transfer tooling to provision jobs for the tables of a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub program: String,
    pub args: Vec<String>,
    pub metadata_path: PathBuf,
}

impl ProvisioningRequest {
    pub fn new(command: &ExternalCommandConfig, metadata_path: PathBuf) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.clone(),
            metadata_path,
        }
    }

    pub fn to_command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(self.args.iter().cloned())
            .option("--metadata", self.metadata_path.display().to_string())
    }
}
