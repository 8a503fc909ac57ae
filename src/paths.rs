//! Deterministic storage locations for node caches.
//!
//! Layout: `{root}/{project_id}/{node_id}` for the flat output cache, with
//! `input/{sub_id}` and `output` subdirectories for the sectioned variant.
//! Directory creation is idempotent.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::key;

/// A node cache section: the flat output list or one keyed input slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Output,
    Input(String),
}

/// Resolved storage location for one project+node pair.
#[derive(Debug, Clone)]
pub struct NodePaths {
    node_dir: PathBuf,
}

impl NodePaths {
    /// Resolve the node directory. Fails only on an empty project or node
    /// id; the caller must not attempt to save without both.
    pub fn resolve(root: &Path, project_id: &str, node_id: &str) -> Result<Self> {
        if project_id.is_empty() {
            bail!("project id must not be empty");
        }
        if node_id.is_empty() {
            bail!("node id must not be empty");
        }
        Ok(Self {
            node_dir: root.join(project_id).join(node_id),
        })
    }

    pub fn node_dir(&self) -> &Path {
        &self.node_dir
    }

    /// Directory for one section; input sub-ids are stored in their
    /// filesystem-safe spelling.
    pub fn section_dir(&self, section: &Section) -> PathBuf {
        match section {
            Section::Output => self.node_dir.join("output"),
            Section::Input(sub_id) => self
                .node_dir
                .join("input")
                .join(key::to_fs_safe(sub_id)),
        }
    }

    /// Create the node directory. Creating an existing directory is not an
    /// error.
    pub fn materialize(&self) -> Result<()> {
        fs::create_dir_all(&self.node_dir)
            .with_context(|| format!("Failed to create cache dir: {}", self.node_dir.display()))
    }

    /// Create one section directory.
    pub fn materialize_section(&self, section: &Section) -> Result<PathBuf> {
        let dir = self.section_dir(section);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create section dir: {}", dir.display()))?;
        Ok(dir)
    }
}

/// Directory holding every node cache of one project.
pub fn project_dir(root: &Path, project_id: &str) -> PathBuf {
    root.join(project_id)
}
