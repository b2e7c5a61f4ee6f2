//! Change-log materializer binary.
//!
//! `run` executes the configured stages of a materialization, `materialize` merges the tables
//! of an existing metadata document, and `reduce` is the reduce step of merge jobs submitted to
//! an external SQL engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use etl_config::shared::{LoggingConfig, MaterializerConfig};
use etl_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_materializer_config;
use crate::core::{materialize_tables, reduce_stdio, run_pipeline};
use crate::error::{MaterializerError, MaterializerResult};

mod config;
mod core;
mod error;

#[derive(Parser)]
#[command(name = "etl-materializer", about = "Materializes staged change logs into base tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the configured stages: DDL, metadata, provisioning, merge and reconciliation
    Run(RunArgs),
    /// Merge the tables listed in an existing metadata document
    Materialize(MaterializeArgs),
    /// Reduce sorted staged rows read from stdin, writing materialized rows to stdout
    Reduce(ReduceArgs),
}

/// Options shared by the subcommands reading the configuration.
#[derive(Args)]
struct CommonArgs {
    /// Directory holding the configuration files, `./configuration` by default
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Table metadata document
    #[arg(short, long)]
    metadata: Option<PathBuf>,
    /// Only process tables of this schema, `*` matches any
    #[arg(short, long)]
    schema: Option<String>,
    /// Only process tables with this name, `*` matches any
    #[arg(short, long)]
    table: Option<String>,
    /// Also log generated scripts
    #[arg(short, long)]
    verbose: bool,
    /// File receiving a copy of the log
    #[arg(short, long)]
    log: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Skip loading the staging table definitions
    #[arg(long)]
    no_staging_ddl: bool,
    /// Skip loading the base table definitions
    #[arg(long)]
    no_base_ddl: bool,
    /// Skip merging staged changes
    #[arg(long)]
    no_merge: bool,
    /// Skip comparing materialized tables with the source
    #[arg(long)]
    no_compare: bool,
}

#[derive(Args)]
struct MaterializeArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct ReduceArgs {
    /// Comma separated key columns
    #[arg(short, long)]
    keys: String,
    /// Comma separated input columns, change metadata first
    #[arg(short, long)]
    columns: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match try_main(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> MaterializerResult<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Run(args) => {
            let config = load_config(&args.common, |config| {
                let stages = &mut config.pipeline.stages;
                stages.staging_ddl &= !args.no_staging_ddl;
                stages.base_ddl &= !args.no_base_ddl;
                stages.merge &= !args.no_merge;
                stages.reconciliation &= !args.no_compare;
            })?;
            let _log_flusher =
                init_tracing(env!("CARGO_BIN_NAME"), &config.logging).map_err(MaterializerError::logging)?;

            let report = runtime.block_on(run_pipeline(Arc::new(config)))?;
            println!("{report}");

            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Materialize(args) => {
            let config = load_config(&args.common, |_| {})?;
            let _log_flusher =
                init_tracing(env!("CARGO_BIN_NAME"), &config.logging).map_err(MaterializerError::logging)?;

            let summaries = runtime.block_on(materialize_tables(Arc::new(config)))?;
            for summary in &summaries {
                println!("{summary}");
            }

            Ok(ExitCode::SUCCESS)
        }
        Command::Reduce(args) => {
            // Runs on the engine's workers without a configuration; logs go to stderr.
            let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), &LoggingConfig::default())
                .map_err(MaterializerError::logging)?;

            let stats = runtime.block_on(reduce_stdio(&args.keys, &args.columns))?;
            info!(
                events = stats.events,
                rows = stats.rows_emitted,
                deleted_keys = stats.keys_deleted,
                "reduce finished"
            );

            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads the configuration and applies the command line overrides.
fn load_config(
    args: &CommonArgs,
    adjust: impl FnOnce(&mut MaterializerConfig),
) -> MaterializerResult<MaterializerConfig> {
    let mut config = load_materializer_config(args.config_dir.as_deref())?;

    if let Some(metadata) = &args.metadata {
        config.pipeline.metadata_path = metadata.clone();
    }
    if let Some(schema) = &args.schema {
        config.pipeline.table_filter.schema = schema.clone();
    }
    if let Some(table) = &args.table {
        config.pipeline.table_filter.table = table.clone();
    }
    if let Some(log) = &args.log {
        config.logging.file = Some(log.clone());
    }
    config.logging.verbose |= args.verbose;
    adjust(&mut config);

    config.validate().map_err(MaterializerError::config)?;

    Ok(config)
}
