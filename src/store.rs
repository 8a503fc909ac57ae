//! Save/load orchestration for one node's datasets.
//!
//! A `CacheStore` owns the metadata index and the cumulative remote-key set
//! for one project+node identity. Remote keys only grow: once a column key
//! has been observed as a remote reference it stays remote for the lifetime
//! of the store, and no artifact is ever written for it again.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::key;
use crate::logging::{operations, services, status};
use crate::metadata::{IndexEntry, Locator, MetadataIndex, StoredValue};
use crate::paths::{project_dir, NodePaths, Section};
use crate::reader::LazyProjectionReader;
use crate::storage::{backend_for, BackendKind, StorageBackend};
use crate::table::{ColumnValue, Dataset, Table};

/// Sectioned node payload: keyed input slots plus the flat output list.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub input: BTreeMap<String, Vec<Dataset>>,
    pub output: Vec<Dataset>,
}

/// Column-subset / row-window parameters for a lazy reload.
#[derive(Debug, Clone, Default)]
pub struct LazyWindow {
    /// Columns to project; None reads the full column set.
    pub columns: Option<Vec<String>>,
    /// Zero-based row offset.
    pub row_start: usize,
    /// Rows to read; None reads to the end of the data.
    pub row_length: Option<usize>,
}

/// Options for a load call.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Rename mapping, keyed by the namespaced spelling. A dataset-level
    /// match renames the key itself and consumes the entry (first match
    /// wins); otherwise remaining entries rename table columns and stay
    /// available for later tables.
    pub renames: HashMap<String, String>,
    /// When false, artifacts are not read and realized values come back as
    /// empty placeholder tables (metadata-only reload).
    pub with_values: bool,
    /// Lazy partial read of columnar artifacts. Ignored by container
    /// caches, which only support whole-container reads.
    pub lazy: Option<LazyWindow>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            renames: HashMap::new(),
            with_values: true,
            lazy: None,
        }
    }
}

impl LoadOptions {
    pub fn with_renames(renames: HashMap<String, String>) -> Self {
        Self {
            renames,
            ..Self::default()
        }
    }
}

/// Artifact count and byte total for one node cache.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub artifact_count: u64,
    pub total_bytes: u64,
    pub node_dir: PathBuf,
}

/// Node-output cache for one project+node identity.
pub struct CacheStore {
    root: PathBuf,
    backend: Box<dyn StorageBackend>,
    backend_kind: BackendKind,
    reader: LazyProjectionReader,
    clean_names: bool,
    project_id: Option<String>,
    node_id: Option<String>,
    path: Option<PathBuf>,
    outputs: MetadataIndex,
    inputs: BTreeMap<String, MetadataIndex>,
    remote_keys: BTreeSet<String>,
}

impl CacheStore {
    /// Build a store from configuration: backend selected by the config
    /// toggle, storage options passed through opaquely.
    pub fn from_config(config: &CacheConfig) -> Self {
        let backend = backend_for(config.backend, &config.storage_options);
        let mut store = Self::with_backend(&config.storage_root, backend, config.clean_names);
        store.reader = LazyProjectionReader::with_prefix(&config.hash_prefix);
        store
    }

    /// Build a store around an explicitly injected backend instance.
    pub fn with_backend(
        root: impl Into<PathBuf>,
        backend: Box<dyn StorageBackend>,
        clean_names: bool,
    ) -> Self {
        let backend_kind = backend.kind();
        Self {
            root: root.into(),
            backend,
            backend_kind,
            reader: LazyProjectionReader::new(),
            clean_names,
            project_id: None,
            node_id: None,
            path: None,
            outputs: MetadataIndex::new(),
            inputs: BTreeMap::new(),
            remote_keys: BTreeSet::new(),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// Resolved node directory, once a save has allocated it.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Which backend variant wrote this cache.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub fn remote_keys(&self) -> &BTreeSet<String> {
        &self.remote_keys
    }

    /// Output-section metadata, in save order.
    pub fn metadata(&self) -> &MetadataIndex {
        &self.outputs
    }

    /// True iff the resolved node path does not exist as a directory.
    pub fn is_empty(&self) -> bool {
        self.path.as_deref().map_or(true, |p| !p.is_dir())
    }

    /// Save the flat output datasets of one node execution.
    pub fn save(
        &mut self,
        node_id: Option<&str>,
        project_id: &str,
        datasets: &[Dataset],
    ) -> Result<(), CacheError> {
        let node = self.resolve_node(node_id)?;
        self.project_id = Some(project_id.to_string());
        info!(
            service = services::STORE,
            operation = operations::SAVE,
            project_id,
            node_id = %node,
            entry_count = datasets.len(),
            "saving node outputs"
        );

        let paths = self.allocate(project_id, &node)?;
        paths
            .materialize()
            .map_err(|e| CacheError::Path(e.to_string()))?;
        let dir = paths.node_dir().to_path_buf();
        self.path = Some(dir.clone());

        self.outputs = self.save_list(datasets, &dir)?;

        info!(
            service = services::STORE,
            operation = operations::SAVE,
            status = status::SUCCESS,
            project_id,
            node_id = %node,
            "node outputs saved"
        );
        Ok(())
    }

    /// Save the sectioned input/output payload of one node execution.
    /// Input sections are keyed by sub-id; output replaces the flat list.
    pub fn save_node_io(
        &mut self,
        node_id: Option<&str>,
        project_id: &str,
        data: &NodeData,
    ) -> Result<(), CacheError> {
        let node = self.resolve_node(node_id)?;
        self.project_id = Some(project_id.to_string());
        info!(
            service = services::STORE,
            operation = operations::SAVE,
            project_id,
            node_id = %node,
            "saving sectioned node data"
        );

        let paths = self.allocate(project_id, &node)?;
        let out_dir = paths
            .materialize_section(&Section::Output)
            .map_err(|e| CacheError::Path(e.to_string()))?;
        self.path = Some(paths.node_dir().to_path_buf());

        self.outputs = self.save_list(&data.output, &out_dir)?;

        self.inputs.clear();
        for (sub_id, datasets) in &data.input {
            let dir = paths
                .materialize_section(&Section::Input(sub_id.clone()))
                .map_err(|e| CacheError::Path(e.to_string()))?;
            let index = self.save_list(datasets, &dir)?;
            self.inputs.insert(key::to_fs_safe(sub_id), index);
        }

        info!(
            service = services::STORE,
            operation = operations::SAVE,
            status = status::SUCCESS,
            project_id,
            node_id = %node,
            input_count = data.input.len(),
            "sectioned node data saved"
        );
        Ok(())
    }

    /// Reload the flat output datasets.
    pub fn load(&self) -> Result<Vec<Dataset>, CacheError> {
        self.load_with(LoadOptions::default())
    }

    /// Reload the flat output datasets with renames / partial options.
    pub fn load_with(&self, mut opts: LoadOptions) -> Result<Vec<Dataset>, CacheError> {
        info!(
            service = services::STORE,
            operation = operations::LOAD,
            project_id = self.project_id.as_deref().unwrap_or(""),
            node_id = self.node_id.as_deref().unwrap_or(""),
            "loading node outputs"
        );
        let datasets = self.load_list(&self.outputs, &mut opts)?;
        info!(
            service = services::STORE,
            operation = operations::LOAD,
            status = status::SUCCESS,
            entry_count = datasets.len(),
            "node outputs loaded"
        );
        Ok(datasets)
    }

    /// Reload the sectioned input/output payload.
    pub fn load_node_io(&self, mut opts: LoadOptions) -> Result<NodeData, CacheError> {
        let output = self.load_list(&self.outputs, &mut opts)?;
        let mut input = BTreeMap::new();
        for (sub_id, index) in &self.inputs {
            let datasets = self.load_list(index, &mut opts)?;
            input.insert(key::to_namespaced(sub_id), datasets);
        }
        Ok(NodeData { input, output })
    }

    /// Clear in-memory metadata and remote keys, keeping identity and path.
    /// The physical artifacts are untouched; only `delete_project_cache`
    /// removes them.
    pub fn clear(&mut self) {
        self.outputs.clear();
        self.inputs.clear();
        self.remote_keys.clear();
    }

    /// Artifact count and byte total under the node directory.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let node_dir = match self.path.clone() {
            Some(dir) if dir.is_dir() => dir,
            other => {
                return Ok(CacheStats {
                    artifact_count: 0,
                    total_bytes: 0,
                    node_dir: other.unwrap_or_default(),
                })
            }
        };

        let mut artifact_count = 0u64;
        let mut total_bytes = 0u64;
        for entry in WalkDir::new(&node_dir) {
            let entry = entry.map_err(|e| CacheError::Storage(e.to_string()))?;
            if entry.file_type().is_file() {
                artifact_count += 1;
                total_bytes += entry
                    .metadata()
                    .map_err(|e| CacheError::Storage(e.to_string()))?
                    .len();
            }
        }
        Ok(CacheStats {
            artifact_count,
            total_bytes,
            node_dir,
        })
    }

    /// Remove the whole physical subtree of one project. Idempotent: a
    /// missing path is not an error. Never touches in-memory store state.
    pub fn delete_project_cache(root: &Path, project_id: &str) -> Result<(), CacheError> {
        let dir = project_dir(root, project_id);
        info!(
            service = services::STORE,
            operation = operations::DELETE,
            project_id,
            path = %dir.display(),
            "deleting project cache"
        );
        if dir.is_dir() {
            fs::remove_dir_all(&dir).map_err(|e| CacheError::Storage(e.to_string()))?;
            info!(
                service = services::STORE,
                operation = operations::DELETE,
                status = status::SUCCESS,
                project_id,
                "project cache deleted"
            );
        } else {
            info!(
                service = services::STORE,
                operation = operations::DELETE,
                status = status::MISS,
                project_id,
                "no project cache to delete"
            );
        }
        Ok(())
    }

    fn resolve_node(&mut self, node_id: Option<&str>) -> Result<String, CacheError> {
        match node_id {
            Some(id) if !id.is_empty() => {
                self.node_id = Some(id.to_string());
                Ok(id.to_string())
            }
            _ => self.node_id.clone().ok_or(CacheError::MissingNode),
        }
    }

    fn allocate(&self, project_id: &str, node_id: &str) -> Result<NodePaths, CacheError> {
        NodePaths::resolve(&self.root, project_id, node_id)
            .map_err(|e| CacheError::Path(e.to_string()))
    }

    fn save_list(
        &mut self,
        datasets: &[Dataset],
        dir: &Path,
    ) -> Result<MetadataIndex, CacheError> {
        let mut index = MetadataIndex::new();
        for dataset in datasets {
            let mut entry = IndexEntry::new(&dataset.name);
            let container_path = dir.join(format!(
                "{}.{}",
                key::to_fs_safe(&dataset.name),
                self.backend.extension()
            ));

            for (column_key, value) in &dataset.data {
                match value {
                    ColumnValue::Remote(literal) => {
                        self.remote_keys.insert(column_key.clone());
                        entry
                            .data
                            .insert(column_key.clone(), StoredValue::Remote(literal.clone()));
                        debug!(
                            service = services::STORE,
                            operation = operations::SAVE,
                            key = %column_key,
                            "remote reference recorded, nothing written"
                        );
                    }
                    _ if self.remote_keys.contains(column_key) => {
                        // Grow-only invariant: a key once marked remote
                        // never produces an artifact again.
                        warn!(
                            service = services::STORE,
                            operation = operations::SAVE,
                            status = status::SKIP,
                            key = %column_key,
                            "key is marked remote, refusing to write an artifact for it"
                        );
                    }
                    ColumnValue::ViewOnly => {
                        warn!(
                            service = services::STORE,
                            operation = operations::SAVE,
                            status = status::SKIP,
                            key = %column_key,
                            "attempted to cache a view-only table; \
                             incomplete instances are not persisted"
                        );
                    }
                    ColumnValue::Realized(table) => {
                        let stem = if self.clean_names {
                            key::strip_namespace(column_key).to_string()
                        } else {
                            key::to_fs_safe(column_key)
                        };
                        let path = if self.backend_kind.groups_per_dataset() {
                            container_path.clone()
                        } else {
                            dir.join(format!("{stem}.{}", self.backend.extension()))
                        };
                        self.backend
                            .save(table, &stem, &path)
                            .map_err(|e| CacheError::Storage(e.to_string()))?;
                        entry.data.insert(
                            stem.clone(),
                            StoredValue::Artifact(Locator { path, key: stem }),
                        );
                    }
                }
            }
            index.push(entry);
        }
        Ok(index)
    }

    fn load_list(
        &self,
        entries: &MetadataIndex,
        opts: &mut LoadOptions,
    ) -> Result<Vec<Dataset>, CacheError> {
        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut dataset = Dataset::new(&entry.name);
            for (column_key, stored) in &entry.data {
                if self.remote_keys.contains(column_key) {
                    // Remote data never touches the cache; the literal is
                    // handed back under its recorded spelling.
                    dataset.insert(
                        column_key.clone(),
                        ColumnValue::Remote(stored.passthrough_literal()),
                    );
                    continue;
                }

                let value = match stored {
                    StoredValue::Remote(literal) => ColumnValue::Remote(literal.clone()),
                    StoredValue::Artifact(locator) => {
                        if !opts.with_values {
                            ColumnValue::Realized(Table::new())
                        } else if let (Some(window), BackendKind::Columnar) =
                            (&opts.lazy, self.backend_kind)
                        {
                            let table = self
                                .reader
                                .read(
                                    &locator.path,
                                    window.columns.as_deref(),
                                    window.row_start,
                                    window.row_length,
                                )
                                .map_err(CacheError::corrupted)?;
                            ColumnValue::Realized(table)
                        } else {
                            let table = self
                                .backend
                                .load(&locator.key, &locator.path)
                                .map_err(CacheError::corrupted)?;
                            ColumnValue::Realized(table)
                        }
                    }
                };

                let namespaced = key::to_namespaced(column_key);
                let (final_key, value) = match opts.renames.remove(&namespaced) {
                    Some(renamed) => (renamed, value),
                    None => {
                        let value = match value {
                            ColumnValue::Realized(mut table) => {
                                table.rename_columns(&opts.renames);
                                ColumnValue::Realized(table)
                            }
                            other => other,
                        };
                        (namespaced, value)
                    }
                };
                dataset.insert(key::to_namespaced(&final_key), value);
            }
            result.push(dataset);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnarBackend, StorageOptions};
    use crate::table::ColumnData;
    use tempfile::TempDir;

    fn store(root: &Path) -> CacheStore {
        CacheStore::with_backend(
            root,
            Box::new(ColumnarBackend::new(&StorageOptions::new())),
            false,
        )
    }

    fn realized(values: &[i64]) -> ColumnValue {
        let mut table = Table::new();
        table
            .push_column(
                "v",
                ColumnData::Int(values.iter().copied().map(Some).collect()),
            )
            .unwrap();
        ColumnValue::Realized(table)
    }

    #[test]
    fn test_save_requires_node_identity() {
        let temp = TempDir::new().unwrap();
        let mut store = store(temp.path());
        let err = store.save(None, "p1", &[]).unwrap_err();
        assert!(matches!(err, CacheError::MissingNode));
    }

    #[test]
    fn test_node_identity_is_sticky() {
        let temp = TempDir::new().unwrap();
        let mut store = store(temp.path());
        store.save(Some("n1"), "p1", &[]).unwrap();
        // Later saves may omit the node id.
        store.save(None, "p1", &[]).unwrap();
        assert_eq!(store.node_id(), Some("n1"));
    }

    #[test]
    fn test_view_only_is_skipped_with_no_record() {
        let temp = TempDir::new().unwrap();
        let mut store = store(temp.path());
        let mut dataset = Dataset::new("out");
        dataset.insert("view", ColumnValue::ViewOnly);
        dataset.insert("real", realized(&[1]));
        store.save(Some("n1"), "p1", &[dataset]).unwrap();

        let entry = &store.metadata()[0];
        assert!(entry.data.contains_key("real"));
        assert!(!entry.data.contains_key("view"));
    }

    #[test]
    fn test_remote_key_never_produces_artifact_again() {
        let temp = TempDir::new().unwrap();
        let mut store = store(temp.path());

        let mut dataset = Dataset::new("out");
        dataset.insert("b", ColumnValue::Remote("s3://external/obj".into()));
        store.save(Some("n1"), "p1", &[dataset]).unwrap();
        assert!(store.remote_keys().contains("b"));

        // Same key, now a realized table: the invariant wins.
        let mut dataset = Dataset::new("out");
        dataset.insert("b", realized(&[1, 2]));
        store.save(Some("n1"), "p1", &[dataset]).unwrap();

        assert!(store.remote_keys().contains("b"));
        assert!(store.metadata()[0].data.is_empty());
        let written: Vec<_> = fs::read_dir(temp.path().join("p1/n1"))
            .unwrap()
            .collect();
        assert!(written.is_empty());
    }

    #[test]
    fn test_clear_empties_state_but_keeps_identity() {
        let temp = TempDir::new().unwrap();
        let mut store = store(temp.path());
        let mut dataset = Dataset::new("out");
        dataset.insert("b", ColumnValue::Remote("ref".into()));
        store.save(Some("n1"), "p1", &[dataset]).unwrap();

        store.clear();
        assert!(store.load().unwrap().is_empty());
        assert!(store.remote_keys().is_empty());
        assert_eq!(store.node_id(), Some("n1"));
        assert!(store.path().is_some());
    }

    #[test]
    fn test_is_empty_tracks_directory() {
        let temp = TempDir::new().unwrap();
        let mut store = store(temp.path());
        assert!(store.is_empty());
        store.save(Some("n1"), "p1", &[]).unwrap();
        assert!(!store.is_empty());
        CacheStore::delete_project_cache(temp.path(), "p1").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_project_cache_is_idempotent() {
        let temp = TempDir::new().unwrap();
        CacheStore::delete_project_cache(temp.path(), "ghost").unwrap();
        CacheStore::delete_project_cache(temp.path(), "ghost").unwrap();
    }

    #[test]
    fn test_stats_counts_artifacts() {
        let temp = TempDir::new().unwrap();
        let mut store = store(temp.path());
        let mut dataset = Dataset::new("out");
        dataset.insert("a", realized(&[1, 2, 3]));
        dataset.insert("b", realized(&[4]));
        store.save(Some("n1"), "p1", &[dataset]).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.artifact_count, 2);
        assert!(stats.total_bytes > 0);
    }
}
