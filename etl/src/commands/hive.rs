//! Merges submitted to Hive as a `DISTRIBUTE BY` / `SORT BY` / `TRANSFORM` query whose reduce
//! step is the `reduce` subcommand of the materializer.

use std::path::PathBuf;

use chrono::Utc;
use etl_config::shared::{HiveMergeConfig, MergeEngine};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::catalog::ColumnDescriptor;
use crate::commands::ddl::ScriptLoadRequest;
use crate::commands::runner::CommandRunner;
use crate::commands::spec::OutputTarget;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::merge::{MergeBackend, MergePlan, MergeSummary};
use crate::types::TableName;

const STAGING_ALIAS: &str = "sbx";

const MAP_ALIAS: &str = "map1";

/// A merge rendered for an external SQL engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJobRequest {
    pub staging_table: TableName,
    pub base_table: TableName,
    pub group_key: Vec<String>,
    pub sort_key: Vec<String>,
    pub reduce_projection: Vec<String>,
    pub output_projection: Vec<ColumnDescriptor>,
    /// Command line the engine runs as the reduce step, without its arguments.
    pub reducer_command: String,
    /// File shipped to the engine before the query runs.
    pub reducer_file: Option<PathBuf>,
}

impl MergeJobRequest {
    pub fn new(plan: &MergePlan, reducer_command: &str, reducer_file: Option<PathBuf>) -> Self {
        Self {
            staging_table: plan.staging_table().clone(),
            base_table: plan.base_table().clone(),
            group_key: plan.group_key().to_vec(),
            sort_key: plan.sort_key().to_vec(),
            reduce_projection: plan.reduce_projection().to_vec(),
            output_projection: plan.output_projection().to_vec(),
            reducer_command: reducer_command.to_owned(),
            reducer_file,
        }
    }

    /// Renders the HiveQL script of the merge.
    pub fn render(&self) -> String {
        let keys = self.group_key.join(",");
        let projection = self.reduce_projection.join(",");
        let output = self
            .output_projection
            .iter()
            .map(|column| format!("{} {}", column.name, column.type_name))
            .collect::<Vec<_>>()
            .join(",");

        let add_file = match &self.reducer_file {
            Some(file) => format!("ADD FILE {};\n", file.display()),
            None => String::new(),
        };

        format!(
            "{add_file}\
FROM (
  SELECT {STAGING_ALIAS}.*
    FROM {staging} {STAGING_ALIAS}
      DISTRIBUTE BY {keys}
      SORT BY {sort}
) {MAP_ALIAS}
INSERT OVERWRITE TABLE {base}
  SELECT TRANSFORM({projection})
    USING '{reducer} -k {keys} -c {projection}'
    AS {output};
",
            staging = self.staging_table,
            sort = self.sort_key.join(","),
            base = self.base_table,
            reducer = self.reducer_command,
        )
    }
}

/// Submits merges to Hive through a [`CommandRunner`].
///
/// Every script is appended to the job log before it runs, and the engine output is appended
/// after it.
#[derive(Debug, Clone)]
pub struct HiveMergeJob<R> {
    runner: R,
    sql_cli: String,
    config: HiveMergeConfig,
    reducer_command: String,
    verbose: bool,
}

impl<R> HiveMergeJob<R> {
    pub fn new(
        runner: R,
        sql_cli: impl Into<String>,
        config: HiveMergeConfig,
        reducer_command: impl Into<String>,
        verbose: bool,
    ) -> Self {
        Self {
            runner,
            sql_cli: sql_cli.into(),
            config,
            reducer_command: reducer_command.into(),
            verbose,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    async fn append_to_log(&self, table: &TableName, script: &str) -> EtlResult<()> {
        let header = format!("-- {table} submitted at {}\n", Utc::now().to_rfc3339());

        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.log_path)
            .await?;
        log.write_all(header.as_bytes()).await?;
        log.write_all(script.as_bytes()).await?;
        log.flush().await?;

        Ok(())
    }
}

impl<R> MergeBackend for HiveMergeJob<R>
where
    R: CommandRunner + Send + Sync,
{
    async fn merge(&self, plan: &MergePlan) -> EtlResult<MergeSummary> {
        let request = MergeJobRequest::new(
            plan,
            &self.reducer_command,
            self.config.reducer_file.clone(),
        );
        let script = request.render();

        if self.verbose {
            info!(table = %plan.base_table(), script = %script, "merge query");
        } else {
            debug!(table = %plan.base_table(), script = %script, "merge query");
        }

        self.append_to_log(plan.base_table(), &script).await?;
        tokio::fs::write(&self.config.script_path, &script).await?;

        let command = ScriptLoadRequest {
            script: self.config.script_path.clone(),
            output: OutputTarget::AppendFile(self.config.log_path.clone()),
        }
        .to_command(&self.sql_cli);

        let output = self.runner.run(&command).await.map_err(|err| {
            etl_error!(
                ErrorKind::MergeExecutionError,
                "Merge job could not be submitted",
                plan.base_table(),
                source: err
            )
        })?;

        if !output.success() {
            return Err(etl_error!(
                ErrorKind::MergeExecutionError,
                "Merge job failed",
                format!(
                    "{}: `{command}` exited with {:?}, see {}",
                    plan.base_table(),
                    output.code,
                    self.config.log_path.display()
                )
            ));
        }

        info!(table = %plan.base_table(), engine = "hive", "table merged");

        Ok(MergeSummary {
            table: plan.base_table().clone(),
            engine: MergeEngine::Hive,
            partitions: None,
            stats: None,
        })
    }
}
