// Shared builders for acceptance tests.
//
// Each test gets its own TempDir-rooted store, so tests run in parallel
// without touching any global cache location.

use tabula::storage::{StorageOptions, ColumnarBackend, ContainerBackend};
use tabula::{CacheStore, ColumnData, ColumnValue, Dataset, Table};

/// Store writing per-column parquet artifacts under `root`.
#[allow(dead_code)]
pub fn columnar_store(root: &std::path::Path) -> CacheStore {
    CacheStore::with_backend(
        root,
        Box::new(ColumnarBackend::new(&StorageOptions::new())),
        false,
    )
}

/// Store writing per-dataset container artifacts under `root`.
#[allow(dead_code)]
pub fn container_store(root: &std::path::Path) -> CacheStore {
    CacheStore::with_backend(
        root,
        Box::new(ContainerBackend::new(&StorageOptions::new())),
        false,
    )
}

/// A small realized table with one int column `v`.
#[allow(dead_code)]
pub fn int_table(values: &[i64]) -> Table {
    let mut table = Table::new();
    table
        .push_column(
            "v",
            ColumnData::Int(values.iter().copied().map(Some).collect()),
        )
        .unwrap();
    table
}

/// A realized table with the given named int columns, 4 rows each.
#[allow(dead_code)]
pub fn named_table(names: &[&str]) -> Table {
    let mut table = Table::new();
    for (offset, name) in names.iter().enumerate() {
        let values = (0..4).map(|row| Some(row + offset as i64 * 10)).collect();
        table.push_column(*name, ColumnData::Int(values)).unwrap();
    }
    table
}

/// One dataset with a single realized column key.
#[allow(dead_code)]
pub fn dataset_with(name: &str, key: &str, table: Table) -> Dataset {
    let mut dataset = Dataset::new(name);
    dataset.insert(key, ColumnValue::Realized(table));
    dataset
}
