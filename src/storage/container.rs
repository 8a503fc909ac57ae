//! Per-dataset-container backend: one keyed binary file per dataset entry.
//!
//! Denser than the per-column layout but whole-container reads only. Each
//! `save` upserts one column key into the container map; geometry columns
//! are stored in their WKT encoding and decoded back on load.

use super::{BackendKind, StorageBackend, StorageOptions};
use crate::logging::{operations, services, status};
use crate::table::{ColumnData, Geometry, Table};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const CONTAINER_VERSION: u32 = 1;

/// On-disk container layout. Kept separate from the in-memory model so the
/// file format never carries non-serializable cells.
#[derive(Debug, Serialize, Deserialize)]
struct ContainerFile {
    version: u32,
    tables: BTreeMap<String, StoredTable>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTable {
    columns: Vec<StoredColumn>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredColumn {
    name: String,
    data: StoredColumnData,
}

#[derive(Debug, Serialize, Deserialize)]
enum StoredColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
    /// Geometry in its serializable WKT encoding.
    Wkt(Vec<Option<String>>),
}

fn encode(table: &Table) -> Result<StoredTable> {
    let mut columns = Vec::with_capacity(table.columns().len());
    for column in table.columns() {
        let data = match &column.data {
            ColumnData::Int(v) => StoredColumnData::Int(v.clone()),
            ColumnData::Float(v) => StoredColumnData::Float(v.clone()),
            ColumnData::Bool(v) => StoredColumnData::Bool(v.clone()),
            ColumnData::Str(v) => StoredColumnData::Str(v.clone()),
            ColumnData::Geometry(v) => StoredColumnData::Wkt(
                v.iter().map(|g| g.as_ref().map(Geometry::to_wkt)).collect(),
            ),
            ColumnData::Mixed(_) => {
                bail!("mixed column '{}' reached the codec unsanitized", column.name)
            }
        };
        columns.push(StoredColumn {
            name: column.name.clone(),
            data,
        });
    }
    Ok(StoredTable { columns })
}

fn decode(stored: &StoredTable) -> Result<Table> {
    let mut table = Table::new();
    for column in &stored.columns {
        let data = match &column.data {
            StoredColumnData::Int(v) => ColumnData::Int(v.clone()),
            StoredColumnData::Float(v) => ColumnData::Float(v.clone()),
            StoredColumnData::Bool(v) => ColumnData::Bool(v.clone()),
            StoredColumnData::Str(v) => ColumnData::Str(v.clone()),
            StoredColumnData::Wkt(v) => ColumnData::Geometry(
                v.iter()
                    .map(|cell| cell.as_deref().map(Geometry::from_wkt).transpose())
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        table.push_column(column.name.clone(), data)?;
    }
    Ok(table)
}

/// Container storage backend writing one keyed file per dataset entry.
pub struct ContainerBackend;

impl ContainerBackend {
    /// Create a backend. The opaque options map is reserved for remote
    /// container roots; the local variant needs none of it.
    pub fn new(_options: &StorageOptions) -> Self {
        Self
    }

    fn read_container(path: &Path) -> Result<ContainerFile> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read container: {}", path.display()))?;
        let container: ContainerFile =
            bincode::deserialize(&bytes).context("Failed to decode container")?;
        if container.version != CONTAINER_VERSION {
            bail!(
                "container version {} is not supported (expected {})",
                container.version,
                CONTAINER_VERSION
            );
        }
        Ok(container)
    }

    fn write_container(path: &Path, container: &ContainerFile) -> Result<()> {
        let bytes = bincode::serialize(container).context("Failed to encode container")?;
        // Write to a temp file, then rename, so a crash mid-write never
        // leaves a truncated container behind.
        let temp = path.with_extension("tbc.tmp");
        fs::write(&temp, bytes)
            .with_context(|| format!("Failed to write container: {}", temp.display()))?;
        fs::rename(&temp, path).context("Failed to rename container into place")?;
        Ok(())
    }
}

impl StorageBackend for ContainerBackend {
    fn save(&self, table: &Table, key: &str, path: &Path) -> Result<()> {
        let (clean, coerced) = table.sanitized();
        if !coerced.is_empty() {
            warn!(
                service = services::CONTAINER,
                operation = operations::SAVE,
                key,
                columns = %coerced.join(", "),
                "mixed data types coerced to strings; the conversion is not reversible"
            );
        }

        let mut container = if path.exists() {
            Self::read_container(path)?
        } else {
            ContainerFile {
                version: CONTAINER_VERSION,
                tables: BTreeMap::new(),
            }
        };
        container.tables.insert(key.to_string(), encode(&clean)?);
        Self::write_container(path, &container)?;

        info!(
            service = services::CONTAINER,
            operation = operations::SAVE,
            status = status::SUCCESS,
            key,
            rows = clean.row_count(),
            keys_in_container = container.tables.len(),
            "container updated"
        );
        Ok(())
    }

    fn load(&self, key: &str, path: &Path) -> Result<Table> {
        debug!(
            service = services::CONTAINER,
            operation = operations::LOAD,
            key,
            path = %path.display(),
            "reading container"
        );
        let container = Self::read_container(path)?;
        let stored = container
            .tables
            .get(key)
            .with_context(|| format!("key '{key}' not found in container"))?;
        decode(stored)
    }

    fn extension(&self) -> &'static str {
        "tbc"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Container
    }
}
