use thiserror::Error;
use tracing::debug;

/// Fatal cache failures surfaced to the graph engine.
///
/// A `Corrupted` error deliberately carries no cause detail: any artifact
/// that fails to load means the node cache can no longer be trusted and the
/// caller should clear it and recompute, not inspect it. The underlying
/// error is logged at debug level for operators.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cannot determine node for save")]
    MissingNode,

    #[error(
        "node cache is unreadable and likely corrupted; \
         clear the project cache and recompute the graph"
    )]
    Corrupted,

    #[error("failed to prepare cache path: {0}")]
    Path(String),

    #[error("failed to write cache artifact: {0}")]
    Storage(String),
}

impl CacheError {
    /// Wrap an artifact-load failure into the opaque fatal error.
    pub(crate) fn corrupted(err: anyhow::Error) -> Self {
        debug!(
            service = crate::logging::services::STORE,
            operation = crate::logging::operations::LOAD,
            status = crate::logging::status::ERROR,
            cause = %err,
            "artifact load failed"
        );
        CacheError::Corrupted
    }
}
