use etl::merge::{MergeBackend, MergeExecutor, MergePlanner, ReducerSpec, reduce_stream};
use etl::test_utils::catalog::table;
use etl::test_utils::event::{event, stage_events, staged_row};
use etl::types::{Cell, OperationCode};
use etl::warehouse::MemoryWarehouse;
use etl::warehouse::codec::encode_row;
use etl_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn stream_reducer_agrees_with_the_in_process_merge() {
    init_test_tracing();

    let descriptor = table(
        "crm",
        "contacts",
        &["region", "id"],
        &[("id", "int"), ("region", "string"), ("email", "string")],
    );
    let plan = MergePlanner::default().plan(&descriptor).unwrap();
    let contact = |id: &str, region: &str, email: Option<&str>| {
        vec![Cell::from(id), Cell::from(region), Cell::from(email)]
    };

    let events = vec![
        event(OperationCode::Insert, 10, 1, contact("1", "eu", Some("a@x"))),
        event(OperationCode::Insert, 10, 2, contact("1", "us", Some("b@x"))),
        event(OperationCode::Update, 11, 1, contact("1", "eu", None)),
        event(OperationCode::Delete, 12, 1, contact("1", "us", None)),
        event(OperationCode::Insert, 13, 1, contact("2", "eu", Some("c@x"))),
    ];

    let warehouse = MemoryWarehouse::new();
    stage_events(&warehouse, &plan, &events).await.unwrap();
    MergeExecutor::new(warehouse.clone(), 3)
        .merge(&plan)
        .await
        .unwrap();
    let materialized: String = warehouse
        .table_rows(plan.base_table())
        .await
        .unwrap()
        .iter()
        .map(|row| format!("{}\n", encode_row(row)))
        .collect();

    // The engine distributes and sorts by the group key, then sequence number and row id.
    let mut sorted = events.clone();
    sorted.sort_by(|a, b| {
        let key = |event: &etl::types::ChangeEvent| {
            (
                event.payload.values()[1].clone(),
                event.payload.values()[0].clone(),
            )
        };
        key(a).cmp(&key(b)).then(a.position().cmp(&b.position()))
    });
    let input: String = sorted
        .iter()
        .map(|event| format!("{}\n", encode_row(&staged_row(event))))
        .collect();

    let spec = ReducerSpec::from_lists(
        &plan.group_key().join(","),
        &plan.reduce_projection().join(","),
    )
    .unwrap();
    let mut output = Vec::new();
    let stats = reduce_stream(input.as_bytes(), &mut output, &spec)
        .await
        .unwrap();

    assert_eq!(String::from_utf8(output).unwrap(), materialized);
    assert_eq!(materialized, "1\teu\t\\N\n2\teu\tc@x\n");
    assert_eq!(stats.rows_emitted, 2);
    assert_eq!(stats.keys_deleted, 1);
}
