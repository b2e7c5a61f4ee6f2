use etl::merge::{MergeBackend, MergeExecutor, MergePlan, MergePlanner};
use etl::test_utils::catalog::key_value_table;
use etl::test_utils::event::{event, stage_events};
use etl::types::{Cell, ChangeEvent, OperationCode, TableRow};
use etl::warehouse::MemoryWarehouse;
use etl_telemetry::tracing::init_test_tracing;

fn plan() -> MergePlan {
    MergePlanner::default()
        .plan(&key_value_table("shop", "kv"))
        .unwrap()
}

fn kv(k: i64, v: &str) -> Vec<Cell> {
    vec![Cell::I64(k), Cell::from(v)]
}

fn row(k: i64, v: &str) -> TableRow {
    TableRow::new(kv(k, v))
}

async fn merge(events: &[ChangeEvent], partitions: usize) -> Vec<TableRow> {
    let warehouse = MemoryWarehouse::new();
    let plan = plan();
    stage_events(&warehouse, &plan, events).await.unwrap();

    MergeExecutor::new(warehouse.clone(), partitions)
        .merge(&plan)
        .await
        .unwrap();

    warehouse.table_rows(plan.base_table()).await.unwrap()
}

fn mixed_history() -> Vec<ChangeEvent> {
    vec![
        event(OperationCode::Insert, 1, 1, kv(1, "a")),
        event(OperationCode::Insert, 1, 2, kv(2, "x")),
        event(OperationCode::Update, 2, 1, kv(1, "b")),
        event(OperationCode::Insert, 3, 1, kv(3, "p")),
        event(OperationCode::Delete, 4, 1, vec![Cell::I64(2), Cell::Null]),
        event(OperationCode::Update, 5, 1, kv(3, "q")),
        event(OperationCode::Update, 5, 2, kv(3, "r")),
        event(OperationCode::Insert, 6, 1, kv(4, "z")),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn last_update_of_each_key_is_materialized() {
    init_test_tracing();

    let rows = merge(
        &[
            event(OperationCode::Insert, 1, 1, kv(1, "a")),
            event(OperationCode::Update, 2, 1, kv(1, "b")),
            event(OperationCode::Insert, 1, 2, kv(2, "x")),
        ],
        4,
    )
    .await;

    assert_eq!(rows, vec![row(1, "b"), row(2, "x")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_key_has_no_materialized_row() {
    init_test_tracing();

    let rows = merge(
        &[
            event(OperationCode::Insert, 1, 1, kv(1, "a")),
            event(OperationCode::Delete, 2, 1, vec![Cell::I64(1), Cell::Null]),
        ],
        4,
    )
    .await;

    assert!(rows.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn staging_order_does_not_change_the_result() {
    init_test_tracing();

    let history = mixed_history();
    let expected = merge(&history, 3).await;
    assert_eq!(expected, vec![row(1, "b"), row(3, "r"), row(4, "z")]);

    let mut reversed = history.clone();
    reversed.reverse();
    assert_eq!(merge(&reversed, 3).await, expected);

    // Interleave from both ends.
    let mut interleaved = Vec::with_capacity(history.len());
    let (mut front, mut back) = (0, history.len());
    while front < back {
        back -= 1;
        interleaved.push(history[back].clone());
        if front < back {
            interleaved.push(history[front].clone());
        }
        front += 1;
    }
    assert_eq!(merge(&interleaved, 3).await, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn partition_count_does_not_change_the_result() {
    init_test_tracing();

    let history = mixed_history();
    let expected = merge(&history, 1).await;

    for partitions in [2, 5, 16] {
        assert_eq!(merge(&history, partitions).await, expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn merging_twice_yields_the_same_table() {
    init_test_tracing();

    let warehouse = MemoryWarehouse::new();
    let plan = plan();
    stage_events(&warehouse, &plan, &mixed_history())
        .await
        .unwrap();
    let executor = MergeExecutor::new(warehouse.clone(), 4);

    executor.merge(&plan).await.unwrap();
    let first = warehouse.table_rows(plan.base_table()).await.unwrap();

    let summary = executor.merge(&plan).await.unwrap();
    let second = warehouse.table_rows(plan.base_table()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(summary.partitions, Some(4));
    let stats = summary.stats.unwrap();
    assert_eq!(stats.events, 8);
    assert_eq!(stats.rows_emitted, 3);
    assert_eq!(stats.keys_deleted, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_staging_table_empties_the_base_table() {
    init_test_tracing();

    let warehouse = MemoryWarehouse::new();
    let plan = plan();
    warehouse
        .append_rows(plan.base_table(), vec![row(9, "stale")])
        .await;
    stage_events(&warehouse, &plan, &[]).await.unwrap();

    MergeExecutor::new(warehouse.clone(), 2)
        .merge(&plan)
        .await
        .unwrap();

    assert_eq!(warehouse.table_rows(plan.base_table()).await, Some(Vec::new()));
}
