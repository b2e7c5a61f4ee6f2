use std::path::Path;

use etl::error::ErrorKind;
use etl::merge::{MergeBackend, MergeExecutor, MergePlanner};
use etl::test_utils::catalog::key_value_table;
use etl::test_utils::config::scratch_dir;
use etl::types::{Cell, TableRow};
use etl::warehouse::{LocalWarehouse, VERSION_POINTER, Warehouse};
use etl_telemetry::tracing::init_test_tracing;

fn text_row(values: &[Option<&str>]) -> TableRow {
    TableRow::new(values.iter().map(|value| Cell::from(*value)).collect())
}

async fn write_part(dir: &Path, name: &str, lines: &[&str]) {
    tokio::fs::create_dir_all(dir).await.unwrap();
    let mut content = lines.join("\n");
    content.push('\n');
    tokio::fs::write(dir.join(name), content).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn staged_part_files_are_merged_into_the_base_table() {
    init_test_tracing();

    let root = scratch_dir("local-merge");
    let warehouse = LocalWarehouse::new(&root);
    let plan = MergePlanner::default()
        .plan(&key_value_table("shop", "kv"))
        .unwrap();
    let staging_dir = root.join("shop").join("stage_xxx_kv");

    write_part(
        &staging_dir,
        "part-00000.tsv",
        &[
            "I\t1\t1\t2024-01-01 00:00:00\t1\ta",
            "I\t1\t2\t\\N\t2\tx",
            "UD\t3\t1\t\\N\t1\ta",
        ],
    )
    .await;
    write_part(
        &staging_dir,
        "part-00001.tsv",
        &["UI\t3\t2\t\\N\t1\tb\\tc", "D\t4\t1\t\\N\t2\t\\N"],
    )
    .await;
    // In-flight files of the engine are hidden and never read.
    write_part(&staging_dir, ".part-00002.tsv", &["garbage"]).await;

    let summary = MergeExecutor::new(warehouse.clone(), 2)
        .merge(&plan)
        .await
        .unwrap();

    let rows = warehouse.read_table(plan.base_table()).await.unwrap();
    assert_eq!(rows, vec![text_row(&[Some("1"), Some("b\tc")])]);
    assert_eq!(summary.stats.unwrap().keys_deleted, 1);

    let table_dir = root.join("shop").join("kv");
    let version = tokio::fs::read_to_string(table_dir.join(VERSION_POINTER))
        .await
        .unwrap();
    let data = tokio::fs::read_to_string(table_dir.join(version).join("data.tsv"))
        .await
        .unwrap();
    assert_eq!(data, "1\tb\\tc\n");

    tokio::fs::remove_dir_all(root).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn previous_base_files_are_replaced() {
    init_test_tracing();

    let root = scratch_dir("local-replace");
    let warehouse = LocalWarehouse::new(&root);
    let plan = MergePlanner::default()
        .plan(&key_value_table("shop", "kv"))
        .unwrap();

    write_part(&root.join("shop").join("kv"), "000000_0.tsv", &["7\told"]).await;
    write_part(
        &root.join("shop").join("stage_xxx_kv"),
        "part-00000.tsv",
        &["I\t1\t1\t\\N\t3\tnew"],
    )
    .await;

    MergeExecutor::new(warehouse.clone(), 1)
        .merge(&plan)
        .await
        .unwrap();

    let rows = warehouse.read_table(plan.base_table()).await.unwrap();
    assert_eq!(rows, vec![text_row(&[Some("3"), Some("new")])]);
    assert!(!root.join("shop").join("kv").join("000000_0.tsv").exists());

    tokio::fs::remove_dir_all(root).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_operation_code_leaves_the_base_table_untouched() {
    init_test_tracing();

    let root = scratch_dir("local-invalid");
    let warehouse = LocalWarehouse::new(&root);
    let plan = MergePlanner::default()
        .plan(&key_value_table("shop", "kv"))
        .unwrap();

    write_part(&root.join("shop").join("kv"), "data.tsv", &["5\tkept"]).await;
    write_part(
        &root.join("shop").join("stage_xxx_kv"),
        "part-00000.tsv",
        &["I\t1\t1\t\\N\t1\ta", "X\t2\t1\t\\N\t1\tb"],
    )
    .await;

    let err = MergeExecutor::new(warehouse.clone(), 2)
        .merge(&plan)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MergeExecutionError);
    let rows = warehouse.read_table(plan.base_table()).await.unwrap();
    assert_eq!(rows, vec![text_row(&[Some("5"), Some("kept")])]);

    tokio::fs::remove_dir_all(root).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_staging_directory_is_reported() {
    init_test_tracing();

    let root = scratch_dir("local-missing");
    let plan = MergePlanner::default()
        .plan(&key_value_table("shop", "kv"))
        .unwrap();

    let err = MergeExecutor::new(LocalWarehouse::new(&root), 2)
        .merge(&plan)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TableMissing);

    tokio::fs::remove_dir_all(root).await.unwrap();
}
