//! Text-encoded result rows.
//!
//! The engine hands back every value as optional text; panels coerce each
//! field explicitly (integers and floats parsed, geometry columns extracted
//! as strings and then parsed as nested JSON). Treating a raw row as
//! already-structured data is an error.

use std::sync::Arc;

use duckdb::types::ValueRef;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value of the first column, for single-column scalar queries.
    pub fn first(&self) -> Option<&str> {
        self.values.first().and_then(|value| value.as_deref())
    }

    /// Text value of a named column; `None` when the column is missing or
    /// the value is NULL.
    pub fn get(&self, name: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|column| column == name)?;
        self.values.get(idx).and_then(|value| value.as_deref())
    }

    pub fn require(&self, name: &str) -> Result<&str, AppError> {
        self.get(name)
            .ok_or_else(|| AppError::Decode(format!("missing or null column '{name}'")))
    }

    pub fn require_i64(&self, name: &str) -> Result<i64, AppError> {
        self.require(name)?
            .parse::<i64>()
            .map_err(|err| AppError::Decode(format!("column '{name}' is not an integer: {err}")))
    }

    pub fn require_f64(&self, name: &str) -> Result<f64, AppError> {
        self.require(name)?
            .parse::<f64>()
            .map_err(|err| AppError::Decode(format!("column '{name}' is not a number: {err}")))
    }

    /// Parses a serialized-GeoJSON column into a geometry. The value is
    /// extracted as a string column first; only then is it parsed as JSON.
    pub fn require_geometry(&self, name: &str) -> Result<geojson::Geometry, AppError> {
        let raw = self.require(name)?;
        serde_json::from_str(raw).map_err(|err| {
            AppError::Decode(format!("column '{name}' is not a GeoJSON geometry: {err}"))
        })
    }
}

/// Renders one engine value as text. NULL maps to `None`.
pub fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Boolean(b) => Some(b.to_string()),
        ValueRef::TinyInt(i) => Some(i.to_string()),
        ValueRef::SmallInt(i) => Some(i.to_string()),
        ValueRef::Int(i) => Some(i.to_string()),
        ValueRef::BigInt(i) => Some(i.to_string()),
        ValueRef::HugeInt(i) => Some(i.to_string()),
        ValueRef::UTinyInt(i) => Some(i.to_string()),
        ValueRef::USmallInt(i) => Some(i.to_string()),
        ValueRef::UInt(i) => Some(i.to_string()),
        ValueRef::UBigInt(i) => Some(i.to_string()),
        ValueRef::Float(f) => Some(f.to_string()),
        ValueRef::Double(f) => Some(f.to_string()),
        ValueRef::Text(s) => Some(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        other => Some(format!("{other:?}")),
    }
}
