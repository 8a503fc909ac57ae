pub mod columnar;
pub mod container;

pub use columnar::ColumnarBackend;
pub use container::ContainerBackend;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::table::Table;

/// Opaque credential/connection map handed to backends by configuration.
pub type StorageOptions = BTreeMap<String, String>;

/// Storage backend trait for tabular artifacts.
///
/// A backend turns one realized table into a physical artifact and back.
/// The two variants differ in container granularity: per-column-file (one
/// artifact per column key, partial reads supported) and per-dataset
/// container (one keyed file holding several column keys).
pub trait StorageBackend: Send + Sync {
    /// Serialize a table under `key` into the artifact at `path`.
    fn save(&self, table: &Table, key: &str, path: &Path) -> Result<()>;

    /// Deserialize the table stored under `key` from the artifact at `path`.
    fn load(&self, key: &str, path: &Path) -> Result<Table>;

    /// Artifact file extension (without the dot).
    fn extension(&self) -> &'static str;

    /// Which variant this backend is.
    fn kind(&self) -> BackendKind;
}

/// Explicit backend variant tag.
///
/// Stored alongside each cache so caches written by an older default remain
/// loadable; the variant is never inferred from artifact contents or error
/// shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One columnar artifact per column key.
    #[default]
    Columnar,
    /// One keyed container file per dataset entry.
    Container,
}

impl BackendKind {
    /// Whether artifacts of this variant are grouped per dataset entry
    /// rather than per column key.
    pub fn groups_per_dataset(self) -> bool {
        matches!(self, BackendKind::Container)
    }
}

/// Construct a backend instance for a variant tag.
///
/// Selection itself is a configuration concern; the cache only requires an
/// instance satisfying [`StorageBackend`], injected at construction.
pub fn backend_for(kind: BackendKind, options: &StorageOptions) -> Box<dyn StorageBackend> {
    match kind {
        BackendKind::Columnar => Box::new(ColumnarBackend::new(options)),
        BackendKind::Container => Box::new(ContainerBackend::new(options)),
    }
}
