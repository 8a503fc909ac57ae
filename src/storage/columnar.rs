//! Per-column-file backend: one Parquet artifact per column key.
//!
//! Parquet gives the lazy read path native column projection and row-range
//! windows; see [`crate::reader`]. Geometry columns are carried as UTF-8
//! WKT tagged through field metadata so they decode back to geometry.

use super::{BackendKind, StorageBackend, StorageOptions};
use crate::logging::{operations, services, status};
use crate::table::{ColumnData, Geometry, Table};
use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Field-metadata key marking columns that need decoding on read.
pub(crate) const KIND_METADATA_KEY: &str = "tabula:kind";
pub(crate) const KIND_GEOMETRY: &str = "geometry";

/// Columnar storage backend writing one Parquet file per column key.
pub struct ColumnarBackend {
    compression: Compression,
}

impl ColumnarBackend {
    /// Create a backend from the opaque storage options.
    ///
    /// Honored option: `compression` = `snappy` (default) | `zstd` | `none`.
    /// Unknown entries are credential material for remote roots and pass
    /// through untouched.
    pub fn new(options: &StorageOptions) -> Self {
        let compression = match options.get("compression").map(String::as_str) {
            None | Some("snappy") => Compression::SNAPPY,
            Some("zstd") => Compression::ZSTD(Default::default()),
            Some("none") => Compression::UNCOMPRESSED,
            Some(other) => {
                warn!(
                    service = services::COLUMNAR,
                    compression = other,
                    "unknown compression option, using snappy"
                );
                Compression::SNAPPY
            }
        };
        Self { compression }
    }
}

impl StorageBackend for ColumnarBackend {
    fn save(&self, table: &Table, key: &str, path: &Path) -> Result<()> {
        let (clean, coerced) = table.sanitized();
        if !coerced.is_empty() {
            warn!(
                service = services::COLUMNAR,
                operation = operations::SAVE,
                key,
                columns = %coerced.join(", "),
                "mixed data types coerced to strings; the conversion is not reversible"
            );
        }

        let batch = table_to_batch(&clean)?;
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create artifact: {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("Failed to open parquet writer")?;
        writer.write(&batch).context("Failed to write record batch")?;
        writer.close().context("Failed to finalize parquet file")?;

        info!(
            service = services::COLUMNAR,
            operation = operations::SAVE,
            status = status::SUCCESS,
            key,
            rows = clean.row_count(),
            "artifact written"
        );
        Ok(())
    }

    fn load(&self, key: &str, path: &Path) -> Result<Table> {
        debug!(
            service = services::COLUMNAR,
            operation = operations::LOAD,
            key,
            path = %path.display(),
            "reading artifact"
        );
        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open artifact: {}", path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("Failed to read parquet metadata")?;
        let schema = builder.schema().clone();
        let reader = builder.build().context("Failed to open parquet reader")?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to decode record batches")?;
        let batch = concat_batches(&schema, &batches).context("Failed to combine batches")?;
        batch_to_table(&batch)
    }

    fn extension(&self) -> &'static str {
        "parquet"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Columnar
    }
}

/// Convert a sanitized table into one record batch.
///
/// Mixed columns must have been coerced by [`Table::sanitized`] before this
/// point; hitting one here is an internal invariant violation.
pub(crate) fn table_to_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns().len());

    for column in table.columns() {
        let (field, array): (Field, ArrayRef) = match &column.data {
            ColumnData::Int(values) => (
                Field::new(&column.name, DataType::Int64, true),
                Arc::new(Int64Array::from(values.clone())),
            ),
            ColumnData::Float(values) => (
                Field::new(&column.name, DataType::Float64, true),
                Arc::new(Float64Array::from(values.clone())),
            ),
            ColumnData::Bool(values) => (
                Field::new(&column.name, DataType::Boolean, true),
                Arc::new(BooleanArray::from(values.clone())),
            ),
            ColumnData::Str(values) => (
                Field::new(&column.name, DataType::Utf8, true),
                Arc::new(StringArray::from(values.clone())),
            ),
            ColumnData::Geometry(values) => {
                let wkt: Vec<Option<String>> = values
                    .iter()
                    .map(|g| g.as_ref().map(Geometry::to_wkt))
                    .collect();
                let metadata = HashMap::from([(
                    KIND_METADATA_KEY.to_string(),
                    KIND_GEOMETRY.to_string(),
                )]);
                (
                    Field::new(&column.name, DataType::Utf8, true).with_metadata(metadata),
                    Arc::new(StringArray::from(wkt)),
                )
            }
            ColumnData::Mixed(_) => {
                bail!("mixed column '{}' reached the codec unsanitized", column.name)
            }
        };
        fields.push(field);
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    if arrays.is_empty() {
        let options = RecordBatchOptions::new().with_row_count(Some(0));
        return RecordBatch::try_new_with_options(schema, arrays, &options)
            .context("Failed to build empty record batch");
    }
    RecordBatch::try_new(schema, arrays).context("Failed to build record batch")
}

/// Convert a record batch back into a table, decoding tagged columns.
pub(crate) fn batch_to_table(batch: &RecordBatch) -> Result<Table> {
    let mut table = Table::new();
    for (index, field) in batch.schema().fields().iter().enumerate() {
        let array = batch.column(index);
        let data = match field.data_type() {
            DataType::Int64 => {
                let array = downcast::<Int64Array>(array, field.name())?;
                ColumnData::Int(array.iter().collect())
            }
            DataType::Float64 => {
                let array = downcast::<Float64Array>(array, field.name())?;
                ColumnData::Float(array.iter().collect())
            }
            DataType::Boolean => {
                let array = downcast::<BooleanArray>(array, field.name())?;
                ColumnData::Bool(array.iter().collect())
            }
            DataType::Utf8 => {
                let array = downcast::<StringArray>(array, field.name())?;
                if field.metadata().get(KIND_METADATA_KEY).map(String::as_str)
                    == Some(KIND_GEOMETRY)
                {
                    let values = array
                        .iter()
                        .map(|cell| cell.map(Geometry::from_wkt).transpose())
                        .collect::<Result<Vec<_>>>()?;
                    ColumnData::Geometry(values)
                } else {
                    ColumnData::Str(
                        array
                            .iter()
                            .map(|cell| cell.map(str::to_string))
                            .collect(),
                    )
                }
            }
            other => bail!(
                "unsupported column type {other} for column '{}'",
                field.name()
            ),
        };
        table.push_column(field.name().clone(), data)?;
    }
    Ok(table)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("column '{name}' has an unexpected array layout"))
}
