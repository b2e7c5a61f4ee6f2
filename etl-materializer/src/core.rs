use std::sync::Arc;

use etl::catalog::{TableFilter, load_catalog_file};
use etl::commands::{HiveMergeJob, ProcessRunner};
use etl::error::EtlError;
use etl::merge::{
    MergeBackend, MergeExecutor, MergePlanner, MergeSummary, ReduceStats, ReducerSpec,
    StagingLayout, merge_tables, reduce_stream,
};
use etl::pipeline::{DefaultStageRunner, PipelineController, PipelineReport};
use etl::reconciliation::{CommandComparator, ComparisonEndpoint, ReconciliationDriver};
use etl::warehouse::LocalWarehouse;
use etl_config::shared::{MaterializerConfig, MergeEngine};
use tokio::io::{BufReader, BufWriter};
use tracing::{debug, info, warn};

use crate::error::MaterializerResult;

/// Runs every enabled stage of a materialization.
///
/// The report is returned whether or not every stage succeeded. Errors are returned only when
/// the run was aborted.
pub async fn run_pipeline(config: Arc<MaterializerConfig>) -> MaterializerResult<PipelineReport> {
    info!("starting materialization run");
    log_config(&config);

    // One arm per engine keeps the merge backend statically dispatched.
    let report = match config.merge.engine {
        MergeEngine::Local => {
            let backend = local_backend(&config);
            run_with_backend(config, backend).await?
        }
        MergeEngine::Hive => {
            let backend = hive_backend(&config);
            run_with_backend(config, backend).await?
        }
    };

    Ok(report)
}

/// Merges the tables of an existing metadata document, without running any other stage.
///
/// Invalid catalog entries are skipped. They fail the command together with the tables that
/// could not be merged, once every valid table was attempted.
pub async fn materialize_tables(config: Arc<MaterializerConfig>) -> MaterializerResult<Vec<MergeSummary>> {
    info!(metadata = %config.pipeline.metadata_path.display(), "starting merge of cataloged tables");
    log_config(&config);

    let catalog = load_catalog_file(&config.pipeline.metadata_path).await?;
    let tables = TableFilter::from(&config.pipeline.table_filter).apply(catalog.tables);
    if tables.is_empty() {
        warn!("no table matches the table filter");
    }

    let planner = MergePlanner::new(StagingLayout::from(&config.merge.staging));
    let result = match config.merge.engine {
        MergeEngine::Local => merge_tables(&local_backend(&config), &planner, &tables).await,
        MergeEngine::Hive => merge_tables(&hive_backend(&config), &planner, &tables).await,
    };

    let mut errors = catalog.errors;
    match result {
        Ok(summaries) if errors.is_empty() => return Ok(summaries),
        Ok(_) => {}
        Err(err) => errors.extend(err.errors().iter().cloned()),
    }

    Err(EtlError::from(errors).into())
}

/// Reduces sorted staged rows from stdin into materialized rows on stdout.
///
/// This is the reduce step of merge jobs submitted to an external engine, so nothing but rows
/// may be written to stdout.
pub async fn reduce_stdio(keys: &str, columns: &str) -> MaterializerResult<ReduceStats> {
    let spec = ReducerSpec::from_lists(keys, columns)?;
    debug!(?spec, "reducing standard input");

    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    let stats = reduce_stream(reader, writer, &spec).await?;

    Ok(stats)
}

async fn run_with_backend<M>(
    config: Arc<MaterializerConfig>,
    backend: M,
) -> MaterializerResult<PipelineReport>
where
    M: MergeBackend + Send + Sync,
{
    let comparator = CommandComparator::new(
        ProcessRunner,
        config.tools.comparator.clone(),
        config.reconciliation.log_path.clone(),
        config.reconciliation.mismatch_exit_codes.clone(),
    );
    let reconciliation = ReconciliationDriver::new(
        comparator,
        ComparisonEndpoint::from(&config.source),
        ComparisonEndpoint::from(&config.warehouse),
    );

    let runner = DefaultStageRunner::new(config.clone(), ProcessRunner, backend, reconciliation);
    let controller = PipelineController::new(config, runner);

    Ok(controller.run().await?)
}

fn local_backend(config: &MaterializerConfig) -> MergeExecutor<LocalWarehouse> {
    MergeExecutor::new(
        LocalWarehouse::new(config.merge.local.root.clone()),
        config.merge.partitions,
    )
}

fn hive_backend(config: &MaterializerConfig) -> HiveMergeJob<ProcessRunner> {
    HiveMergeJob::new(
        ProcessRunner,
        config.warehouse.sql_cli.clone(),
        config.merge.hive.clone(),
        config.tools.reducer_command.clone(),
        config.logging.verbose,
    )
}

fn log_config(config: &MaterializerConfig) {
    debug!(
        url = config.source.url,
        username = config.source.username,
        schema = config.source.schema,
        "using source config"
    );
    debug!(
        url = config.warehouse.url,
        username = config.warehouse.username,
        sql_cli = config.warehouse.sql_cli,
        "using warehouse config"
    );
    debug!(
        stages = ?config.pipeline.stages,
        abort_on_failure = ?config.pipeline.abort_on_failure,
        metadata_path = %config.pipeline.metadata_path.display(),
        schema_filter = config.pipeline.table_filter.schema,
        table_filter = config.pipeline.table_filter.table,
        "using pipeline config"
    );
    debug!(
        engine = ?config.merge.engine,
        partitions = config.merge.partitions,
        "using merge config"
    );
}

#[cfg(test)]
mod tests {
    use etl::error::ErrorKind;
    use etl::test_utils::catalog::{catalog_entry, key_value_table};
    use etl::test_utils::config::{scratch_dir, test_config};
    use etl::types::{Cell, TableName, TableRow};
    use etl::warehouse::Warehouse;

    use super::*;

    #[tokio::test]
    async fn valid_tables_are_merged_before_catalog_errors_are_reported() {
        let dir = scratch_dir("materialize");
        let config = test_config(&dir);

        let kv = key_value_table("shop", "kv");
        let mut broken = catalog_entry(&key_value_table("shop", "broken"));
        broken["keys"] = serde_json::json!([]);
        let document = serde_json::json!({ "tables": [catalog_entry(&kv), broken] });
        tokio::fs::write(&config.pipeline.metadata_path, document.to_string())
            .await
            .unwrap();

        let warehouse = LocalWarehouse::new(config.merge.local.root.clone());
        let staging = warehouse.table_dir(&TableName::new("shop", "stage_xxx_kv"));
        tokio::fs::create_dir_all(&staging).await.unwrap();
        tokio::fs::write(staging.join("part-00000.tsv"), "I\t1\t1\t\\N\t1\ta\n")
            .await
            .unwrap();

        let err = materialize_tables(Arc::new(config)).await.unwrap_err();

        match err {
            crate::error::MaterializerError::Etl(err) => {
                assert_eq!(err.kinds(), vec![ErrorKind::CatalogParseError])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            warehouse
                .read_table(&TableName::new("shop", "kv"))
                .await
                .unwrap(),
            vec![TableRow::new(vec![Cell::from("1"), Cell::from("a")])]
        );

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }
}
