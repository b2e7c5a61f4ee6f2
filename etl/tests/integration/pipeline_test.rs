use std::sync::Arc;

use etl::catalog::LoadedCatalog;
use etl::commands::{HiveMergeJob, OutputTarget};
use etl::error::{ErrorKind, EtlError};
use etl::merge::{MergeExecutor, MergePlanner};
use etl::pipeline::{
    DefaultStageRunner, Disposition, PipelineController, Stage, StageStatus,
};
use etl::reconciliation::{
    CommandComparator, ComparisonEndpoint, ComparisonOutcome, ReconciliationDriver,
    ReconciliationReport,
};
use etl::test_utils::catalog::{catalog_document, catalog_entry, key_value_table, table};
use etl::test_utils::command::RecordingRunner;
use etl::test_utils::comparator::ScriptedComparator;
use etl::test_utils::config::{scratch_dir, test_config, with_all_stages};
use etl::test_utils::event::{event, stage_events};
use etl::test_utils::pipeline::{ScriptedOutcome, ScriptedStageRunner};
use etl::types::{Cell, OperationCode, TableName, TableRow};
use etl::warehouse::MemoryWarehouse;
use etl_config::shared::{AbortPolicy, DdlGeneratorConfig, MaterializerConfig, StageSwitches};
use etl_telemetry::tracing::init_test_tracing;
use serde_json::json;

fn config_with(stages: StageSwitches, abort_on_failure: AbortPolicy) -> MaterializerConfig {
    let mut config = test_config(&scratch_dir("pipeline"));
    config.pipeline.stages = stages;
    config.pipeline.abort_on_failure = abort_on_failure;

    config
}

fn merge_only() -> StageSwitches {
    StageSwitches {
        merge: true,
        ..StageSwitches::none()
    }
}

fn reconciliation(comparator: ScriptedComparator, config: &MaterializerConfig) -> ReconciliationDriver<ScriptedComparator> {
    ReconciliationDriver::new(
        comparator,
        ComparisonEndpoint::from(&config.source),
        ComparisonEndpoint::from(&config.warehouse),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_alone_forces_metadata_generation() {
    init_test_tracing();

    let config = Arc::new(config_with(merge_only(), AbortPolicy::default()));
    let runner = ScriptedStageRunner::new().with_catalog(vec![key_value_table("shop", "kv")]);
    let controller = PipelineController::new(config, runner);

    let report = controller.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(
        controller.runner().stages_run().await,
        vec![Stage::MetadataGeneration, Stage::Merge]
    );
    let metadata = report
        .stages
        .iter()
        .find(|record| record.stage == Stage::MetadataGeneration)
        .unwrap();
    assert_eq!(
        metadata.disposition,
        Disposition::Forced {
            by: vec![Stage::Merge]
        }
    );
    assert_eq!(report.status(Stage::StagingDdl), Some(&StageStatus::Skipped));
    assert_eq!(report.status(Stage::Reconciliation), Some(&StageStatus::Skipped));

    let calls = controller.runner().calls().await;
    assert_eq!(calls[1].tables, Some(vec![TableName::new("shop", "kv")]));
}

#[tokio::test(flavor = "multi_thread")]
async fn aborting_stage_halts_the_run() {
    init_test_tracing();

    let stages = StageSwitches {
        staging_ddl: false,
        base_ddl: false,
        ..StageSwitches::default()
    };
    let config = Arc::new(config_with(stages, AbortPolicy::default()));
    let runner = ScriptedStageRunner::new()
        .with_catalog(vec![key_value_table("shop", "kv")])
        .with(Stage::Merge, ScriptedOutcome::Fail(ErrorKind::MergeExecutionError));
    let controller = PipelineController::new(config, runner);

    let err = controller.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PipelineAborted);
    assert_eq!(err.detail(), Some("merge"));
    assert_eq!(
        controller.runner().stages_run().await,
        vec![Stage::MetadataGeneration, Stage::Merge]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn recorded_failure_lets_later_stages_run() {
    init_test_tracing();

    let stages = StageSwitches {
        reconciliation: true,
        ..merge_only()
    };
    let config = Arc::new(config_with(stages, AbortPolicy::continue_on_error()));
    let runner = ScriptedStageRunner::new()
        .with_catalog(vec![key_value_table("shop", "kv")])
        .with(Stage::Merge, ScriptedOutcome::Fail(ErrorKind::MergeExecutionError))
        .with(
            Stage::Reconciliation,
            ScriptedOutcome::Reconciled(ReconciliationReport {
                outcomes: vec![(TableName::new("shop", "kv"), ComparisonOutcome::Failed)],
                interrupted_by: None,
            }),
        );
    let controller = PipelineController::new(config, runner);

    let report = controller.run().await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed_stages(), vec![Stage::Merge, Stage::Reconciliation]);
    match report.status(Stage::Reconciliation) {
        Some(StageStatus::Failed(err)) => {
            assert_eq!(err.kind(), ErrorKind::ReconciliationMismatch)
        }
        other => panic!("unexpected reconciliation status: {other:?}"),
    }
    assert_eq!(
        report.tables,
        vec![(TableName::new("shop", "kv"), ComparisonOutcome::Failed)]
    );
    assert!(report.to_string().ends_with("### Pipeline FAILED"));
}

#[tokio::test(flavor = "multi_thread")]
async fn interrupted_reconciliation_keeps_the_tables_already_compared() {
    init_test_tracing();

    let stages = StageSwitches {
        reconciliation: true,
        ..StageSwitches::none()
    };
    let config = Arc::new(config_with(stages, AbortPolicy::continue_on_error()));
    let runner = ScriptedStageRunner::new()
        .with_catalog(vec![key_value_table("shop", "kv"), key_value_table("shop", "lost")])
        .with(
            Stage::Reconciliation,
            ScriptedOutcome::Reconciled(ReconciliationReport {
                outcomes: vec![(TableName::new("shop", "kv"), ComparisonOutcome::Passed)],
                interrupted_by: Some(EtlError::from((
                    ErrorKind::ReconciliationInfrastructureError,
                    "Comparator could not run",
                ))),
            }),
        );
    let controller = PipelineController::new(config, runner);

    let report = controller.run().await.unwrap();

    match report.status(Stage::Reconciliation) {
        Some(StageStatus::Failed(err)) => {
            assert_eq!(err.kind(), ErrorKind::ReconciliationInfrastructureError)
        }
        other => panic!("unexpected reconciliation status: {other:?}"),
    }
    assert_eq!(
        report.tables,
        vec![(TableName::new("shop", "kv"), ComparisonOutcome::Passed)]
    );
    assert!(report.to_string().contains("shop.kv"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stage_without_a_catalog_is_a_missing_dependency() {
    init_test_tracing();

    let config = Arc::new(config_with(merge_only(), AbortPolicy::continue_on_error()));
    let runner = ScriptedStageRunner::new().with(
        Stage::MetadataGeneration,
        ScriptedOutcome::Fail(ErrorKind::CommandFailed),
    );
    let controller = PipelineController::new(config, runner);

    let err = controller.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingDependency);
    assert_eq!(
        controller.runner().stages_run().await,
        vec![Stage::MetadataGeneration]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unparsable_catalog_halts_the_run_regardless_of_policy() {
    init_test_tracing();

    let config = Arc::new(config_with(merge_only(), AbortPolicy::continue_on_error()));
    let runner = ScriptedStageRunner::new().with(
        Stage::MetadataGeneration,
        ScriptedOutcome::Fail(ErrorKind::CatalogParseError),
    );
    let controller = PipelineController::new(config, runner);

    let err = controller.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PipelineAborted);
    assert_eq!(
        controller.runner().stages_run().await,
        vec![Stage::MetadataGeneration]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_catalog_entry_is_reported_and_valid_tables_are_processed() {
    init_test_tracing();

    let mut config = config_with(
        StageSwitches {
            reconciliation: true,
            ..merge_only()
        },
        AbortPolicy {
            metadata_generation: false,
            ..AbortPolicy::default()
        },
    );
    let config = Arc::new(config);

    let kv = key_value_table("shop", "kv");
    let mut broken = catalog_entry(&table("shop", "broken", &["id"], &[("id", "int")]));
    broken.as_object_mut().unwrap().remove("keys");
    let document = json!({ "tables": [catalog_entry(&kv), broken] }).to_string();

    let commands = RecordingRunner::new();
    commands
        .write_output_for(DdlGeneratorConfig::DEFAULT_METADATA_TEMPLATE, document)
        .await;

    let warehouse = MemoryWarehouse::new();
    let plan = MergePlanner::default().plan(&kv).unwrap();
    stage_events(
        &warehouse,
        &plan,
        &[
            event(OperationCode::Insert, 1, 1, vec![Cell::I64(1), Cell::from("a")]),
            event(OperationCode::Update, 2, 1, vec![Cell::I64(1), Cell::from("b")]),
        ],
    )
    .await
    .unwrap();

    let comparator = ScriptedComparator::new();
    let runner = DefaultStageRunner::new(
        config.clone(),
        commands.clone(),
        MergeExecutor::new(warehouse.clone(), 2),
        reconciliation(comparator.clone(), &config),
    );
    let controller = PipelineController::new(config, runner);

    let report = controller.run().await.unwrap();

    assert_eq!(report.failed_stages(), vec![Stage::MetadataGeneration]);
    match report.status(Stage::MetadataGeneration) {
        Some(StageStatus::Failed(err)) => {
            assert_eq!(err.kinds(), vec![ErrorKind::CatalogParseError]);
            assert!(err.detail().unwrap().starts_with("tables[1]"));
        }
        other => panic!("unexpected metadata status: {other:?}"),
    }
    assert_eq!(report.status(Stage::Merge), Some(&StageStatus::Succeeded));
    assert_eq!(
        warehouse.table_rows(&TableName::new("shop", "kv")).await,
        Some(vec![TableRow::new(vec![Cell::I64(1), Cell::from("b")])])
    );
    assert_eq!(warehouse.table_rows(&TableName::new("shop", "broken")).await, None);
    assert_eq!(comparator.compared().await, vec![TableName::new("shop", "kv")]);
    assert_eq!(commands.programs().await, vec!["ddlscan".to_owned()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_drives_the_external_tools_in_stage_order() {
    init_test_tracing();

    let dir = scratch_dir("pipeline-hive");
    let config = Arc::new(with_all_stages(test_config(&dir), true));

    let orders = table("shop", "orders", &["id"], &[("id", "int"), ("total", "double")]);
    let commands = RecordingRunner::new();
    commands
        .write_output_for(
            DdlGeneratorConfig::DEFAULT_METADATA_TEMPLATE,
            catalog_document(&[orders]),
        )
        .await;
    // The comparator reports differing rows.
    commands.queue_exit_code("dc", 1).await;

    let merge_job = HiveMergeJob::new(
        commands.clone(),
        config.warehouse.sql_cli.clone(),
        config.merge.hive.clone(),
        config.tools.reducer_command.clone(),
        false,
    );
    let comparator = CommandComparator::new(
        commands.clone(),
        config.tools.comparator.clone(),
        config.reconciliation.log_path.clone(),
        config.reconciliation.mismatch_exit_codes.clone(),
    );
    let runner = DefaultStageRunner::new(
        config.clone(),
        commands.clone(),
        merge_job,
        ReconciliationDriver::new(
            comparator,
            ComparisonEndpoint::from(&config.source),
            ComparisonEndpoint::from(&config.warehouse),
        ),
    );
    let controller = PipelineController::new(config.clone(), runner);

    let report = controller.run().await.unwrap();

    assert_eq!(report.failed_stages(), vec![Stage::Reconciliation]);
    assert_eq!(
        report.tables,
        vec![(TableName::new("shop", "orders"), ComparisonOutcome::Failed)]
    );
    assert_eq!(
        commands.programs().await,
        vec!["ddlscan", "hive", "ddlscan", "hive", "ddlscan", "provision", "hive", "dc"]
    );

    let recorded = commands.commands().await;
    assert_eq!(recorded[0].option("-template"), Some(DdlGeneratorConfig::DEFAULT_STAGING_TEMPLATE));
    assert_eq!(recorded[0].option("-pass"), Some("source-secret"));
    assert!(!recorded[0].rendered.contains("source-secret"));
    assert_eq!(recorded[1].option("-f"), Some(dir.join("staging.sql").to_str().unwrap()));
    assert_eq!(
        recorded[5].option("--metadata"),
        Some(dir.join("meta.json").to_str().unwrap())
    );
    assert_eq!(
        recorded[6].output,
        OutputTarget::AppendFile(config.merge.hive.log_path.clone())
    );
    assert_eq!(recorded[7].option("-keys"), Some("id"));

    let script = tokio::fs::read_to_string(&config.merge.hive.script_path)
        .await
        .unwrap();
    assert!(script.contains("INSERT OVERWRITE TABLE shop.orders"));
    let log = tokio::fs::read_to_string(&config.merge.hive.log_path)
        .await
        .unwrap();
    assert!(log.starts_with("-- shop.orders submitted at "));
    assert!(log.ends_with(&script));

    tokio::fs::remove_dir_all(dir).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_ddl_load_aborts_before_the_catalog_is_generated() {
    init_test_tracing();

    let dir = scratch_dir("pipeline-ddl");
    let config = Arc::new(test_config(&dir));
    let commands = RecordingRunner::new();
    commands.queue_exit_code("hive", 64).await;

    let runner = DefaultStageRunner::new(
        config.clone(),
        commands.clone(),
        MergeExecutor::new(MemoryWarehouse::new(), 1),
        reconciliation(ScriptedComparator::new(), &config),
    );
    let controller = PipelineController::new(config, runner);

    let err = controller.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PipelineAborted);
    assert_eq!(err.detail(), Some("staging_ddl"));
    assert_eq!(commands.programs().await, vec!["ddlscan", "hive"]);

    tokio::fs::remove_dir_all(dir).await.unwrap();
}

#[test]
fn scripted_catalog_errors_are_aggregated() {
    let catalog = LoadedCatalog {
        tables: Vec::new(),
        errors: vec![
            EtlError::from((ErrorKind::CatalogParseError, "Catalog entry has no key columns")),
            EtlError::from((ErrorKind::MergePlanError, "Catalog entry violates a table invariant")),
        ],
    };

    let err = catalog.into_result().unwrap_err();

    assert_eq!(
        err.kinds(),
        vec![ErrorKind::CatalogParseError, ErrorKind::MergePlanError]
    );
}
