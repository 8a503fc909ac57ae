//! Lazy partial reads of columnar artifacts.
//!
//! Reads a column subset and/or row window from a per-column-file artifact
//! without materializing the rest. Column names are resolved in three
//! tiers: the requested names verbatim, then their hashed spellings
//! (training-time pipelines persist generated features under hashed names),
//! then a silent fall back to the full column set. A resolution miss never
//! aborts a lazy read.

use anyhow::{Context, Result};
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::key::hashed_column_names;
use crate::logging::{operations, services};
use crate::storage::columnar::batch_to_table;
use crate::table::Table;

/// Column-subset / row-window reader for columnar artifacts.
#[derive(Debug, Clone, Default)]
pub struct LazyProjectionReader {
    hash_prefix: String,
}

impl LazyProjectionReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefix applied by the hashed-name fallback tier.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            hash_prefix: prefix.into(),
        }
    }

    /// Read `columns` within the row window `[row_start, row_start +
    /// row_length)`. `columns = None` reads the full column set;
    /// `row_length = None` reads to the end of the data.
    pub fn read(
        &self,
        path: &Path,
        columns: Option<&[String]>,
        row_start: usize,
        row_length: Option<usize>,
    ) -> Result<Table> {
        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open artifact: {}", path.display()))?;
        let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("Failed to read parquet metadata")?;
        let schema = builder.schema().clone();

        let projection = columns.and_then(|requested| self.resolve(&schema, requested, path));
        let projected_schema: SchemaRef = match &projection {
            Some(indices) => Arc::new(
                schema
                    .project(indices)
                    .context("Failed to project schema")?,
            ),
            None => schema.clone(),
        };

        if let Some(indices) = &projection {
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());
            builder = builder.with_projection(mask);
        }
        builder = builder.with_offset(row_start);
        if let Some(length) = row_length {
            builder = builder.with_limit(length);
        }

        let reader = builder.build().context("Failed to open parquet reader")?;
        let batches = reader
            .collect::<std::result::Result<Vec<RecordBatch>, _>>()
            .context("Failed to decode record batches")?;
        let batch =
            concat_batches(&projected_schema, &batches).context("Failed to combine batches")?;
        batch_to_table(&batch)
    }

    /// Three-tier column resolution. Returns the projected root indices in
    /// file order (the projection mask is a set, so reads come back in file
    /// order regardless of the requested order), or None for a full read.
    fn resolve(&self, schema: &SchemaRef, requested: &[String], path: &Path) -> Option<Vec<usize>> {
        if let Some(indices) = resolve_verbatim(schema, requested) {
            return Some(indices);
        }

        let hashed = hashed_column_names(requested, &self.hash_prefix);
        if let Some(indices) = resolve_verbatim(schema, &hashed) {
            debug!(
                service = services::READER,
                operation = operations::LOAD,
                path = %path.display(),
                "columns resolved through their hashed spellings"
            );
            return Some(indices);
        }

        debug!(
            service = services::READER,
            operation = operations::LOAD,
            path = %path.display(),
            "columns not resolvable, reading the full column set"
        );
        None
    }
}

fn resolve_verbatim(schema: &SchemaRef, names: &[String]) -> Option<Vec<usize>> {
    let mut indices = names
        .iter()
        .map(|name| schema.index_of(name).ok())
        .collect::<Option<Vec<usize>>>()?;
    indices.sort_unstable();
    indices.dedup();
    Some(indices)
}
