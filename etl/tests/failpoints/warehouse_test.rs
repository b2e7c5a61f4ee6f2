use etl::error::ErrorKind;
use etl::failpoints::WAREHOUSE_AFTER_PUBLISH;
use etl::merge::{MergeBackend, MergeExecutor, MergePlanner};
use etl::test_utils::catalog::key_value_table;
use etl::test_utils::config::scratch_dir;
use etl::test_utils::failpoints::FailpointGuard;
use etl::types::{Cell, TableRow};
use etl::warehouse::{LocalWarehouse, Warehouse};
use etl_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn published_version_hides_files_not_yet_removed() {
    init_test_tracing();
    let _guard = FailpointGuard::setup(&[(WAREHOUSE_AFTER_PUBLISH, "return")]);

    let root = scratch_dir("local-publish");
    let warehouse = LocalWarehouse::new(&root);
    let plan = MergePlanner::default()
        .plan(&key_value_table("shop", "kv"))
        .unwrap();
    let base_dir = warehouse.table_dir(plan.base_table());
    let staging_dir = warehouse.table_dir(plan.staging_table());
    tokio::fs::create_dir_all(&base_dir).await.unwrap();
    tokio::fs::create_dir_all(&staging_dir).await.unwrap();
    tokio::fs::write(base_dir.join("000000_0.tsv"), "7\told\n")
        .await
        .unwrap();
    tokio::fs::write(staging_dir.join("part-00000.tsv"), "I\t1\t1\t\\N\t3\tnew\n")
        .await
        .unwrap();

    let err = MergeExecutor::new(warehouse.clone(), 2)
        .merge(&plan)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InjectedFailure);
    // The superseded part file is still on disk but no longer part of the table.
    assert!(base_dir.join("000000_0.tsv").exists());
    assert_eq!(
        warehouse.read_table(plan.base_table()).await.unwrap(),
        vec![TableRow::new(vec![Cell::from("3"), Cell::from("new")])]
    );

    tokio::fs::remove_dir_all(root).await.unwrap();
}
