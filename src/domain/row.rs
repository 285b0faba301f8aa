//! Structural row records.
//!
//! A [`Row`] is an ordered list of [`Value`]s paired with the column names
//! of the result set it came from. Column names are resolved once per
//! result set and shared between its rows through an [`Arc`].

use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeMap;

use super::value::{FromValue, Value};
use crate::error::DataGateError;

/// Ordered column names shared by every row of one result set.
pub type Columns = Arc<[String]>;

/// A single record.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Columns,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `values` must line up with `columns`.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Decode`] if the lengths differ.
    pub fn new(columns: Columns, values: Vec<Value>) -> Result<Self, DataGateError> {
        if columns.len() != values.len() {
            return Err(DataGateError::Decode {
                column: "*".to_string(),
                message: format!(
                    "{} column name(s) for {} value(s)",
                    columns.len(),
                    values.len()
                ),
            });
        }
        Ok(Self { columns, values })
    }

    /// Column names in select order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Shared handle to the column names.
    #[must_use]
    pub fn column_names(&self) -> &Columns {
        &self.columns
    }

    /// Values in select order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` for a row with no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, if any.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column called `name`, if any.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
    }

    /// Reads column `name` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Decode`] if the column is missing or its
    /// value cannot be converted.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, DataGateError> {
        let value = self.value(name).ok_or_else(|| DataGateError::Decode {
            column: name.to_string(),
            message: "no such column".to_string(),
        })?;
        T::from_value(name, value)
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// The fully materialized result of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    /// Wraps already-decoded rows.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Rows in store order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consumes the set, returning its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the statement produced no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A fixed-size slice of a result set produced by the batch stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    /// Zero-based batch number.
    pub index: u64,
    /// Records in this batch; at most `batch_size` of them.
    pub rows: Vec<Row>,
}

/// A page of a result set produced by the page stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// One-based page number.
    pub number: u64,
    /// Offset of the first row of this page.
    pub offset: u64,
    /// Records on this page; at most `page_size` of them.
    pub rows: Vec<Row>,
}
