use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use etl_config::shared::{ComparatorConfig, SourceConfig, WarehouseConfig};
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::catalog::TableDescriptor;
use crate::commands::{CommandRunner, CommandSpec, OutputTarget};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::TableName;

/// Connection to one side of a comparison.
#[derive(Debug, Clone)]
pub struct ComparisonEndpoint {
    pub url: String,
    pub username: String,
    pub password: SecretString,
}

impl From<&SourceConfig> for ComparisonEndpoint {
    fn from(config: &SourceConfig) -> Self {
        Self {
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

impl From<&WarehouseConfig> for ComparisonEndpoint {
    fn from(config: &WarehouseConfig) -> Self {
        Self {
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

/// Asks the comparator to diff one source table against its materialized counterpart.
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub source: ComparisonEndpoint,
    pub target: ComparisonEndpoint,
    pub table: TableName,
    pub keys: Vec<String>,
}

impl ComparisonRequest {
    pub fn new(source: ComparisonEndpoint, target: ComparisonEndpoint, table: &TableDescriptor) -> Self {
        Self {
            source,
            target,
            table: table.table_name(),
            keys: table.keys().to_vec(),
        }
    }

    /// Renders the comparator invocation, appending its output to `log_path`.
    pub fn to_command(&self, config: &ComparatorConfig, log_path: PathBuf) -> CommandSpec {
        let mut command = CommandSpec::new(&config.program)
            .option("-url1", &self.source.url)
            .option("-user1", &self.source.username)
            .secret_option("-password1", self.source.password.clone())
            .option("-url2", &self.target.url)
            .option("-user2", &self.target.username)
            .secret_option("-password2", self.target.password.clone())
            .option("-schema", &self.table.schema)
            .option("-table", &self.table.name);
        if config.verbose {
            command = command.arg("-verbose");
        }
        command = command
            .option("-keys", self.keys.join(","))
            .option("-driver", &config.driver)
            .output(OutputTarget::AppendFile(log_path));

        for var in &config.env {
            command = command.env(&var.name, &var.value);
        }

        command
    }
}

/// Result of comparing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// Source and materialized rows agree.
    Passed,
    /// The comparator found differing rows.
    Failed,
}

impl ComparisonOutcome {
    pub fn is_passed(self) -> bool {
        self == ComparisonOutcome::Passed
    }
}

impl fmt::Display for ComparisonOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOutcome::Passed => write!(f, "SUCCEEDED"),
            ComparisonOutcome::Failed => write!(f, "FAILED"),
        }
    }
}

/// Compares a source table with its materialized counterpart.
///
/// A mismatch is an [`ComparisonOutcome::Failed`], never an error. Errors are reserved for a
/// comparator that could not run, with kind [`ErrorKind::ReconciliationInfrastructureError`].
pub trait Comparator {
    fn compare(
        &self,
        request: &ComparisonRequest,
    ) -> impl Future<Output = EtlResult<ComparisonOutcome>> + Send;
}

/// Runs the configured comparator program through a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct CommandComparator<R> {
    runner: R,
    config: ComparatorConfig,
    log_path: PathBuf,
    mismatch_exit_codes: Vec<i32>,
}

impl<R> CommandComparator<R> {
    pub fn new(
        runner: R,
        config: ComparatorConfig,
        log_path: PathBuf,
        mismatch_exit_codes: Vec<i32>,
    ) -> Self {
        Self {
            runner,
            config,
            log_path,
            mismatch_exit_codes,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Maps an exit code to an outcome, `None` when the code reports a broken comparator.
    pub fn classify(&self, code: Option<i32>) -> Option<ComparisonOutcome> {
        match code {
            Some(0) => Some(ComparisonOutcome::Passed),
            Some(code) if self.mismatch_exit_codes.contains(&code) => {
                Some(ComparisonOutcome::Failed)
            }
            _ => None,
        }
    }
}

impl<R> Comparator for CommandComparator<R>
where
    R: CommandRunner + Send + Sync,
{
    async fn compare(&self, request: &ComparisonRequest) -> EtlResult<ComparisonOutcome> {
        let command = request.to_command(&self.config, self.log_path.clone());

        let output = self.runner.run(&command).await.map_err(|err| {
            etl_error!(
                ErrorKind::ReconciliationInfrastructureError,
                "Comparator could not be started",
                request.table,
                source: err
            )
        })?;

        match self.classify(output.code) {
            Some(outcome) => {
                debug!(table = %request.table, %outcome, "table compared");
                Ok(outcome)
            }
            None => {
                warn!(table = %request.table, code = ?output.code, "comparator failed");
                Err(etl_error!(
                    ErrorKind::ReconciliationInfrastructureError,
                    "Comparator terminated abnormally",
                    format!(
                        "{}: `{command}` exited with {:?}, see {}",
                        request.table,
                        output.code,
                        self.log_path.display()
                    )
                ))
            }
        }
    }
}
