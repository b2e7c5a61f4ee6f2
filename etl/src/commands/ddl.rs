use std::path::PathBuf;

use etl_config::shared::{DdlGeneratorConfig, SourceConfig};
use secrecy::SecretString;

use crate::commands::spec::{CommandSpec, OutputTarget};

/// Kind of definitions produced by the DDL generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    /// Change log tables the replicated events are staged into.
    Staging,
    /// Materialized tables the merge writes.
    Base,
    /// The JSON catalog describing every table.
    Metadata,
}

impl DdlKind {
    fn template(self, config: &DdlGeneratorConfig) -> &str {
        match self {
            DdlKind::Staging => &config.staging_template,
            DdlKind::Base => &config.base_template,
            DdlKind::Metadata => &config.metadata_template,
        }
    }

    fn script_name(self) -> &'static str {
        match self {
            DdlKind::Staging => "staging.sql",
            DdlKind::Base => "base.sql",
            DdlKind::Metadata => "meta.json",
        }
    }
}

/// Asks the DDL generator to render one template against the source schema.
#[derive(Debug, Clone)]
pub struct DdlGenerationRequest {
    pub template: String,
    pub url: String,
    pub username: String,
    pub password: SecretString,
    pub schema: String,
    pub output: PathBuf,
}

impl DdlGenerationRequest {
    /// Builds the request for `kind` writing to the generator's script directory.
    pub fn new(kind: DdlKind, source: &SourceConfig, generator: &DdlGeneratorConfig) -> Self {
        Self::with_output(kind, source, generator, generator.script_dir.join(kind.script_name()))
    }

    pub fn with_output(
        kind: DdlKind,
        source: &SourceConfig,
        generator: &DdlGeneratorConfig,
        output: PathBuf,
    ) -> Self {
        Self {
            template: kind.template(generator).to_owned(),
            url: source.url.clone(),
            username: source.username.clone(),
            password: source.password.clone(),
            schema: source.schema.clone(),
            output,
        }
    }

    pub fn to_command(&self, generator: &DdlGeneratorConfig) -> CommandSpec {
        CommandSpec::new(&generator.program)
            .option("-template", &self.template)
            .option("-user", &self.username)
            .secret_option("-pass", self.password.clone())
            .option("-url", &self.url)
            .option("-db", &self.schema)
            .output(OutputTarget::File(self.output.clone()))
    }
}

/// Asks the SQL engine to execute a script file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLoadRequest {
    pub script: PathBuf,
    pub output: OutputTarget,
}

impl ScriptLoadRequest {
    pub fn new(script: PathBuf) -> Self {
        Self {
            script,
            output: OutputTarget::Capture,
        }
    }

    pub fn to_command(&self, sql_cli: &str) -> CommandSpec {
        CommandSpec::new(sql_cli)
            .option("-f", self.script.display().to_string())
            .output(self.output.clone())
    }
}
