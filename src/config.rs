use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::{BackendKind, StorageOptions};

/// Cache configuration (loaded from a TOML file or built in code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Storage root: a local path or a remote object-store URI prefix.
    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    /// Credential/connection map passed opaquely to the storage backend
    /// (e.g. `key`/`secret` for an object store, `compression` locally).
    #[serde(default)]
    pub storage_options: StorageOptions,

    /// Which backend variant new caches are written with.
    #[serde(default)]
    pub backend: BackendKind,

    /// Strip the namespace prefix from column keys when deriving artifact
    /// names.
    #[serde(default)]
    pub clean_names: bool,

    /// Prefix applied by the lazy reader's hashed-name fallback tier.
    #[serde(default)]
    pub hash_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            storage_options: StorageOptions::new(),
            backend: BackendKind::default(),
            clean_names: false,
            hash_prefix: String::new(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Storage root as a path.
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }
}

/// Default storage root following platform cache conventions
///
/// - Linux/Unix: $XDG_CACHE_HOME/tabula/projects or ~/.cache/tabula/projects
/// - macOS: ~/Library/Caches/tabula/projects
fn default_storage_root() -> String {
    let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".tabula"));
    base.join("tabula").join("projects").display().to_string()
}
