// Library interface for Tabula
// Caches the tabular outputs/inputs of computation-graph nodes so
// downstream steps and re-runs do not recompute data.

pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod metadata;
pub mod paths;
pub mod reader;
pub mod storage;
pub mod store;
pub mod table;

// Re-export commonly used types
pub use config::CacheConfig;
pub use error::CacheError;
pub use reader::LazyProjectionReader;
pub use storage::{backend_for, BackendKind, ColumnarBackend, ContainerBackend, StorageBackend};
pub use store::{CacheStats, CacheStore, LazyWindow, LoadOptions, NodeData};
pub use table::{ColumnData, ColumnValue, Dataset, Geometry, Table, Value};
