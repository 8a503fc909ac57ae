// Acceptance tests for the save/load pipeline against the columnar backend.

mod common;

use common::{columnar_store, dataset_with, int_table, named_table};
use std::collections::HashMap;
use tabula::store::{LazyWindow, LoadOptions, NodeData};
use tabula::{CacheStore, ColumnValue, Dataset};
use tempfile::TempDir;

#[test]
fn round_trip_reproduces_equal_table() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());
    let table = named_table(&["x", "y"]);

    store
        .save(Some("n1"), "p1", &[dataset_with("out", "result", table.clone())])
        .unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "out");
    assert_eq!(loaded[0].data["result"], ColumnValue::Realized(table));
}

#[test]
fn namespaced_keys_round_trip_through_fs_spelling() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());

    store
        .save(
            Some("n1"),
            "p1",
            &[dataset_with("out", "features:proba", int_table(&[1, 2]))],
        )
        .unwrap();

    // The artifact carries the filesystem-safe spelling.
    assert!(temp.path().join("p1/n1/features_proba.parquet").is_file());

    // The caller sees the namespaced spelling again.
    let loaded = store.load().unwrap();
    assert!(loaded[0].data.contains_key("features:proba"));
}

#[test]
fn remote_reference_scenario() {
    // Save one dataset "features" with {"a": table, "b": "s3://external/obj"}.
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());
    let table_a = named_table(&["f1", "f2"]);

    let mut dataset = Dataset::new("features");
    dataset.insert("a", ColumnValue::Realized(table_a.clone()));
    dataset.insert("b", ColumnValue::Remote("s3://external/obj".into()));
    store.save(Some("n1"), "p1", &[dataset]).unwrap();

    // Artifact written only for "a".
    assert!(temp.path().join("p1/n1/a.parquet").is_file());
    assert!(!temp.path().join("p1/n1/b.parquet").exists());

    // Metadata for "b" equals the literal; remote_keys == {"b"}.
    assert_eq!(
        store.metadata()[0].data["b"],
        tabula::metadata::StoredValue::Remote("s3://external/obj".into())
    );
    assert_eq!(
        store.remote_keys().iter().collect::<Vec<_>>(),
        vec![&"b".to_string()]
    );

    // Reload returns the round-tripped table and the unchanged literal.
    let loaded = store.load().unwrap();
    assert_eq!(loaded[0].data["a"], ColumnValue::Realized(table_a));
    assert_eq!(
        loaded[0].data["b"],
        ColumnValue::Remote("s3://external/obj".into())
    );
}

#[test]
fn remote_key_set_only_grows() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());

    let mut dataset = Dataset::new("out");
    dataset.insert("k", ColumnValue::Remote("ref://one".into()));
    store.save(Some("n1"), "p1", &[dataset]).unwrap();

    // A realized table under the same key in a later save writes nothing.
    store
        .save(Some("n1"), "p1", &[dataset_with("out", "k", int_table(&[5]))])
        .unwrap();

    assert!(store.remote_keys().contains("k"));
    assert!(!temp.path().join("p1/n1/k.parquet").exists());
}

#[test]
fn rename_matching_dataset_key_is_consumed_on_first_match() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());

    // Two entries expose the same column key.
    store
        .save(
            Some("n1"),
            "p1",
            &[
                dataset_with("first", "proba", int_table(&[1])),
                dataset_with("second", "proba", int_table(&[2])),
            ],
        )
        .unwrap();

    let mut renames = HashMap::new();
    renames.insert("proba".to_string(), "score".to_string());
    let loaded = store.load_with(LoadOptions::with_renames(renames)).unwrap();

    // First match consumed the entry; the later key stays unrenamed.
    assert!(loaded[0].data.contains_key("score"));
    assert!(!loaded[0].data.contains_key("proba"));
    assert!(loaded[1].data.contains_key("proba"));
    assert!(!loaded[1].data.contains_key("score"));
}

#[test]
fn rename_without_dataset_match_renames_table_columns() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());

    store
        .save(
            Some("n1"),
            "p1",
            &[
                dataset_with("a", "t1", named_table(&["old", "keep"])),
                dataset_with("b", "t2", named_table(&["old"])),
            ],
        )
        .unwrap();

    let mut renames = HashMap::new();
    renames.insert("old".to_string(), "new".to_string());
    let loaded = store.load_with(LoadOptions::with_renames(renames)).unwrap();

    // No dataset-level key matches "old", so the mapping applies to the
    // internal columns of every table and is not consumed.
    let t1 = loaded[0].data["t1"].as_table().unwrap();
    assert_eq!(t1.column_names(), vec!["new", "keep"]);
    let t2 = loaded[1].data["t2"].as_table().unwrap();
    assert_eq!(t2.column_names(), vec!["new"]);
}

#[test]
fn rename_entry_matching_nothing_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());
    store
        .save(Some("n1"), "p1", &[dataset_with("out", "k", int_table(&[1]))])
        .unwrap();

    let mut renames = HashMap::new();
    renames.insert("absent".to_string(), "whatever".to_string());
    let loaded = store.load_with(LoadOptions::with_renames(renames)).unwrap();
    assert!(loaded[0].data.contains_key("k"));
}

#[test]
fn metadata_only_reload_returns_placeholders() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());
    store
        .save(Some("n1"), "p1", &[dataset_with("out", "k", int_table(&[1, 2, 3]))])
        .unwrap();

    let opts = LoadOptions {
        with_values: false,
        ..LoadOptions::default()
    };
    let loaded = store.load_with(opts).unwrap();
    let table = loaded[0].data["k"].as_table().unwrap();
    assert_eq!(table.row_count(), 0);
}

#[test]
fn lazy_window_reload_projects_columns_and_rows() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());
    store
        .save(
            Some("n1"),
            "p1",
            &[dataset_with("out", "wide", named_table(&["a", "b", "c"]))],
        )
        .unwrap();

    let opts = LoadOptions {
        lazy: Some(LazyWindow {
            columns: Some(vec!["b".to_string()]),
            row_start: 1,
            row_length: Some(2),
        }),
        ..LoadOptions::default()
    };
    let loaded = store.load_with(opts).unwrap();
    let table = loaded[0].data["wide"].as_table().unwrap();
    assert_eq!(table.column_names(), vec!["b"]);
    assert_eq!(table.row_count(), 2);
}

#[test]
fn corrupted_artifact_fails_with_opaque_error() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());
    store
        .save(Some("n1"), "p1", &[dataset_with("out", "k", int_table(&[1]))])
        .unwrap();

    std::fs::write(temp.path().join("p1/n1/k.parquet"), b"garbage").unwrap();

    let err = store.load().unwrap_err();
    assert!(matches!(err, tabula::CacheError::Corrupted));
    assert!(err.to_string().contains("corrupted"));
}

#[test]
fn sectioned_save_and_load() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());

    let mut data = NodeData::default();
    data.output.push(dataset_with("out", "res", int_table(&[1])));
    data.input.insert(
        "slot:0".to_string(),
        vec![dataset_with("in", "feed", int_table(&[2, 3]))],
    );
    store.save_node_io(Some("n1"), "p1", &data).unwrap();

    assert!(temp.path().join("p1/n1/output/res.parquet").is_file());
    assert!(temp.path().join("p1/n1/input/slot_0/feed.parquet").is_file());

    let loaded = store.load_node_io(LoadOptions::default()).unwrap();
    assert_eq!(loaded.output[0].data["res"], ColumnValue::Realized(int_table(&[1])));
    let slot = &loaded.input["slot:0"];
    assert_eq!(slot[0].data["feed"], ColumnValue::Realized(int_table(&[2, 3])));
}

#[test]
fn clean_names_strip_namespace_prefix() {
    let temp = TempDir::new().unwrap();
    let mut store = CacheStore::with_backend(
        temp.path(),
        Box::new(tabula::ColumnarBackend::new(&Default::default())),
        true,
    );

    store
        .save(
            Some("n1"),
            "p1",
            &[dataset_with("out", "model:features:proba", int_table(&[1]))],
        )
        .unwrap();

    assert!(temp.path().join("p1/n1/proba.parquet").is_file());
    let loaded = store.load().unwrap();
    assert!(loaded[0].data.contains_key("proba"));
}

#[test]
fn drop_clears_state_and_delete_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut store = columnar_store(temp.path());

    let mut dataset = dataset_with("out", "k", int_table(&[1]));
    dataset.insert("r", ColumnValue::Remote("ref".into()));
    store.save(Some("n1"), "p1", &[dataset]).unwrap();

    store.clear();
    assert!(store.load().unwrap().is_empty());
    assert!(store.remote_keys().is_empty());

    CacheStore::delete_project_cache(temp.path(), "p1").unwrap();
    CacheStore::delete_project_cache(temp.path(), "p1").unwrap();
    assert!(store.is_empty());
}
