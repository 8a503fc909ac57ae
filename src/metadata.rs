//! The metadata index: what was stored where.
//!
//! Built during save, replayed during load. Each entry mirrors one
//! [`Dataset`](crate::table::Dataset) and maps column keys to either a
//! physical artifact locator or a pass-through remote literal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Physical location of one stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Artifact file written by a storage backend.
    pub path: PathBuf,
    /// Key within the artifact (container backends hold several keys per
    /// file; per-column backends ignore it on read).
    pub key: String,
}

/// What the index records for one column key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredValue {
    /// Literal pass-through value, recorded verbatim, never serialized.
    Remote(String),
    /// Stored artifact written by a backend.
    Artifact(Locator),
}

impl StoredValue {
    /// The literal handed back on load for remote keys. An artifact locator
    /// degrades to its path string, matching the pass-through contract.
    pub fn passthrough_literal(&self) -> String {
        match self {
            StoredValue::Remote(literal) => literal.clone(),
            StoredValue::Artifact(locator) => locator.path.display().to_string(),
        }
    }
}

/// Index entry for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexEntry {
    pub name: String,
    pub data: BTreeMap<String, StoredValue>,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }
}

/// Ordered list of dataset entries for one section.
pub type MetadataIndex = Vec<IndexEntry>;
