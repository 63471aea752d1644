//! Query result tables

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A result column as declared by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type ("datetime", "string", "long", ...)
    #[serde(rename = "type", default)]
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A result table: ordered columns plus rows aligned to them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Replace the rows of this table
    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &Value> + '_> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| CoreError::ColumnNotFound(name.to_string()))?;
        Ok(self.rows.iter().map(move |row| row.get(idx).unwrap_or(&Value::Null)))
    }

    /// Rows as JSON objects keyed by column name, in column order
    pub fn records(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        self.rows.iter().map(move |row| {
            self.columns
                .iter()
                .enumerate()
                .map(|(i, col)| (col.name.clone(), row.get(i).cloned().unwrap_or(Value::Null)))
                .collect()
        })
    }

    /// Concatenate tables in order, aligning columns by name.
    ///
    /// The output columns are the union of all input columns in first-seen
    /// order; cells missing from a table are `null`. Rows are not re-sorted.
    pub fn concat<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Table {
        let mut out = Table::default();

        for table in tables {
            if out.name.is_empty() {
                out.name = table.name.clone();
            }

            let mapping: Vec<usize> = table
                .columns
                .iter()
                .map(|col| match out.column_index(&col.name) {
                    Some(idx) => idx,
                    None => {
                        out.columns.push(col.clone());
                        for row in &mut out.rows {
                            row.push(Value::Null);
                        }
                        out.columns.len() - 1
                    }
                })
                .collect();

            out.rows.reserve(table.rows.len());
            for row in &table.rows {
                let mut aligned = vec![Value::Null; out.columns.len()];
                for (src, value) in row.iter().enumerate() {
                    if let Some(&dst) = mapping.get(src) {
                        aligned[dst] = value.clone();
                    }
                }
                out.rows.push(aligned);
            }
        }

        out
    }
}
