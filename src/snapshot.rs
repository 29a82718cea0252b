use std::collections::HashMap;

use rusqlite::types::ValueRef;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Result;

/// A single SQLite value, one per storage class.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// True for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The integer, if this is an INTEGER value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The number as `f64`, for REAL and INTEGER values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The string, if this is a TEXT value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            // SQLite does not enforce UTF-8 on TEXT.
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One row of a [`TableSnapshot`], borrowed from it.
///
/// Behaves as an ordered mapping from column name to value.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Value of `column`, or `None` if the row has no such column.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let values = self.values;
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &values[idx])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let (columns, values) = (self.columns, self.values);
        columns.iter().map(String::as_str).zip(values.iter())
    }

    pub fn to_map(&self) -> HashMap<String, Value> {
        self.iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Point-in-time copy of a whole table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TableSnapshot {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TableSnapshot {
    /// Every row in `rows` must have one value per column.
    ///
    /// # Panics
    ///
    /// Panics if a row's width differs from the number of columns.
    pub(crate) fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        assert!(
            rows.iter().all(|r| r.len() == columns.len()),
            "row width does not match column count"
        );
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows as owned column-name maps.
    pub fn records(&self) -> Vec<HashMap<String, Value>> {
        self.rows().map(|r| r.to_map()).collect()
    }

    /// Rows as a JSON array of objects, keys in column order.
    pub fn to_json(&self) -> Result<String> {
        let rows: Vec<Row<'_>> = self.rows().collect();
        Ok(serde_json::to_string(&rows)?)
    }
}
