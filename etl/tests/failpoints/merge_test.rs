use etl::error::ErrorKind;
use etl::failpoints::MERGE_BEFORE_REPLACE;
use etl::merge::{MergeBackend, MergeExecutor, MergePlanner};
use etl::test_utils::catalog::key_value_table;
use etl::test_utils::event::{event, stage_events};
use etl::test_utils::failpoints::FailpointGuard;
use etl::types::{Cell, OperationCode, TableRow};
use etl::warehouse::MemoryWarehouse;
use etl_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn failure_before_replace_leaves_the_base_table_untouched() {
    init_test_tracing();
    let _guard = FailpointGuard::setup(&[(MERGE_BEFORE_REPLACE, "return")]);

    let warehouse = MemoryWarehouse::new();
    let plan = MergePlanner::default()
        .plan(&key_value_table("shop", "kv"))
        .unwrap();
    let previous = vec![TableRow::new(vec![Cell::I64(1), Cell::from("old")])];
    warehouse
        .append_rows(plan.base_table(), previous.clone())
        .await;
    stage_events(
        &warehouse,
        &plan,
        &[event(
            OperationCode::Update,
            2,
            1,
            vec![Cell::I64(1), Cell::from("new")],
        )],
    )
    .await
    .unwrap();

    let err = MergeExecutor::new(warehouse.clone(), 2)
        .merge(&plan)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InjectedFailure);
    assert_eq!(warehouse.table_rows(plan.base_table()).await, Some(previous));
}
