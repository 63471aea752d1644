use logbatch_core::{Column, Table};
use logbatch_export::{build_store, Exporter, StoreTarget};
use serde_json::{json, Value};

fn sample_table() -> Table {
    Table::new(
        "PrimaryResult",
        vec![
            Column::new("TimeGenerated", "datetime"),
            Column::new("ResultCode", "string"),
        ],
    )
    .with_rows(vec![
        vec![json!("2024-05-31T23:00:00Z"), json!("200")],
        vec![json!("2024-05-31T22:00:00Z"), json!("500")],
    ])
}

#[tokio::test]
async fn export_creates_directories_and_writes_records() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("exports");
    assert!(!root.exists());

    let store = build_store(&StoreTarget::Local { root: root.clone() }).unwrap();
    let exporter = Exporter::new(store, "app-requests/2024-06-01");

    let summary = exporter.export(&sample_table(), "results.jsonl").await.unwrap();
    assert_eq!(summary.rows, 2);

    let written = root.join("app-requests").join("2024-06-01").join("results.jsonl");
    let contents = std::fs::read_to_string(&written).unwrap();
    let records: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["ResultCode"], json!("200"));
    assert_eq!(records[1]["TimeGenerated"], json!("2024-05-31T22:00:00Z"));
}

#[tokio::test]
async fn re_export_replaces_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = build_store(&StoreTarget::Local {
        root: dir.path().to_path_buf(),
    })
    .unwrap();
    let exporter = Exporter::new(store, "out");

    exporter.export(&sample_table(), "results.jsonl").await.unwrap();
    exporter.export(&Table::default(), "results.jsonl").await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("out").join("results.jsonl")).unwrap();
    assert!(contents.is_empty());
}
