//! Column-key naming conventions.
//!
//! A column key has two equivalent textual spellings: the namespaced form
//! used by the graph engine (`features:proba`) and the filesystem-safe form
//! used for artifact names (`features_proba`). Conversion is applied at
//! every read/write boundary so metadata and artifacts always agree.

use sha2::{Digest, Sha256};

/// Namespaced separator used by the graph engine.
pub const NAMESPACE_SEP: char = ':';

/// Filesystem-safe separator used for artifact names.
pub const FS_SEP: char = '_';

/// Convert a key to its filesystem-safe spelling.
pub fn to_fs_safe(key: &str) -> String {
    key.replace(NAMESPACE_SEP, "_")
}

/// Convert a key back to its namespaced spelling.
pub fn to_namespaced(key: &str) -> String {
    key.replace(FS_SEP, ":")
}

/// Strip the namespace prefix, keeping only the final segment.
///
/// `"model:features:proba"` becomes `"proba"`; a key without a namespace is
/// returned unchanged.
pub fn strip_namespace(key: &str) -> &str {
    key.rsplit(NAMESPACE_SEP).next().unwrap_or(key)
}

/// Derive the alternate candidate names used by lazy-read fallback.
///
/// Training-time pipelines persist generated feature columns under hashed
/// names while inference-time callers request the human-readable originals.
/// The transform is deterministic: `{prefix}{first 16 hex chars of
/// sha256(name)}`.
pub fn hashed_column_names(names: &[String], prefix: &str) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let mut hasher = Sha256::new();
            hasher.update(name.as_bytes());
            let digest = hex::encode(hasher.finalize());
            format!("{}{}", prefix, &digest[..16])
        })
        .collect()
}
