//! In-memory tabular values exchanged with the graph engine.
//!
//! A node execution hands the cache a list of [`Dataset`]s; each maps a
//! column key to a [`ColumnValue`]. The value kind is resolved once at the
//! save boundary: a remote reference passes through untouched, a view-only
//! table is refused, and only a realized table ever produces an artifact.

pub mod geometry;

pub use geometry::Geometry;

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};

/// One cell of a mixed-type column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Geometry(Geometry),
}

impl Value {
    /// String coercion used by the pre-write remediation pass. Nulls stay
    /// null rather than becoming the literal `"null"`.
    fn coerce_to_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Bool(v) => Some(v.to_string()),
            Value::Str(v) => Some(v.clone()),
            Value::Geometry(g) => Some(g.to_wkt()),
        }
    }
}

/// Column storage, one vector per logical type, nullable per cell.
///
/// `Mixed` columns arise from upstream type drift; storage backends coerce
/// them to strings before writing (a one-way, warned conversion).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
    Geometry(Vec<Option<Geometry>>),
    Mixed(Vec<Value>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Str(v) => v.len(),
            ColumnData::Geometry(v) => v.len(),
            ColumnData::Mixed(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, ColumnData::Mixed(_))
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// A realized table: named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// An empty table (no columns, no rows).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. All columns of a table must have the same length.
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if let Some(first) = self.columns.first() {
            if first.data.len() != data.len() {
                bail!(
                    "column '{}' has {} rows, table has {}",
                    name,
                    data.len(),
                    first.data.len()
                );
            }
        }
        self.columns.push(Column { name, data });
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Rename internal columns from a mapping. Entries that match nothing
    /// are ignored; the mapping is not consumed because it may apply to
    /// several tables.
    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) {
        for column in &mut self.columns {
            if let Some(new_name) = mapping.get(&column.name) {
                column.name = new_name.clone();
            }
        }
    }

    /// Pre-write remediation pass shared by the storage backends.
    ///
    /// Classifies per-column issues up front and applies one deterministic
    /// policy: duplicate names get an occurrence-counter suffix (silent),
    /// mixed-type columns are coerced to strings (the caller warns with the
    /// returned names). Geometry encoding is a codec concern and stays with
    /// the backends.
    pub fn sanitized(&self) -> (Table, Vec<String>) {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut coerced = Vec::new();
        let mut columns = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let occurrence = seen.entry(column.name.clone()).or_insert(0);
            let name = if *occurrence == 0 {
                column.name.clone()
            } else {
                format!("{}{}", column.name, occurrence)
            };
            *occurrence += 1;

            let data = match &column.data {
                ColumnData::Mixed(values) => {
                    coerced.push(column.name.clone());
                    ColumnData::Str(values.iter().map(Value::coerce_to_string).collect())
                }
                other => other.clone(),
            };

            columns.push(Column { name, data });
        }

        (Table { columns }, coerced)
    }
}

/// A column value at the save/load boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Opaque pointer to externally-owned data; passed through, never
    /// serialized.
    Remote(String),
    /// Display-only table with no guaranteed row data; must not be cached.
    ViewOnly,
    /// A realized table eligible for caching.
    Realized(Table),
}

impl ColumnValue {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            ColumnValue::Realized(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_remote(&self) -> Option<&str> {
        match self {
            ColumnValue::Remote(literal) => Some(literal),
            _ => None,
        }
    }
}

/// One named logical unit of tabular output/input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub data: BTreeMap<String, ColumnValue>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ColumnValue) {
        self.data.insert(key.into(), value);
    }
}
