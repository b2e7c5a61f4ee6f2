use std::sync::Arc;

use etl::error::ErrorKind;
use etl::failpoints::PIPELINE_BEFORE_STAGE;
use etl::pipeline::{PipelineController, Stage};
use etl::test_utils::catalog::key_value_table;
use etl::test_utils::config::{scratch_dir, test_config};
use etl::test_utils::failpoints::FailpointGuard;
use etl::test_utils::pipeline::ScriptedStageRunner;
use etl_config::shared::{AbortPolicy, StageSwitches};
use etl_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn injected_failure_aborts_the_first_stage() {
    init_test_tracing();
    let _guard = FailpointGuard::setup(&[(PIPELINE_BEFORE_STAGE, "return")]);

    let config = Arc::new(test_config(&scratch_dir("failpoint-abort")));
    let runner = ScriptedStageRunner::new().with_catalog(vec![key_value_table("shop", "kv")]);
    let controller = PipelineController::new(config, runner);

    let err = controller.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PipelineAborted);
    assert_eq!(err.detail(), Some("staging_ddl"));
    assert!(controller.runner().stages_run().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_failures_are_recorded_when_stages_continue_on_error() {
    init_test_tracing();
    // Only the first stage fails.
    let _guard = FailpointGuard::setup(&[(PIPELINE_BEFORE_STAGE, "1*return->off")]);

    let mut config = test_config(&scratch_dir("failpoint-continue"));
    config.pipeline.stages = StageSwitches {
        staging_ddl: true,
        base_ddl: true,
        ..StageSwitches::none()
    };
    config.pipeline.abort_on_failure = AbortPolicy::continue_on_error();
    let controller = PipelineController::new(Arc::new(config), ScriptedStageRunner::new());

    let report = controller.run().await.unwrap();

    assert_eq!(report.failed_stages(), vec![Stage::StagingDdl]);
    assert_eq!(controller.runner().stages_run().await, vec![Stage::BaseDdl]);
}
