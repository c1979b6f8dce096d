// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Flat, typed tabular frame built from nested JSON payloads.
//!
//! Mirrors the shape the warehouse loader needs: a fixed column order
//! shared by every row, with cells coerced to a small set of SQL-ready
//! types.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::AppError;

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// A flat frame: named columns plus rows of cells in column order.
#[derive(Debug, Clone)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. The row length must match the column count.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (row, column name), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// Flatten a nested JSON object into `prefix_key` entries, the same way
/// `json_normalize` does with an underscore separator. Arrays are kept
/// as leaf values.
pub fn flatten_json(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}_{}", prefix, key)
                };
                flatten_into(child, name, out);
            }
        }
        other => {
            out.insert(prefix, other.clone());
        }
    }
}

/// Select the allow-listed columns from a flattened object.
///
/// Columns outside the allow-list are silently dropped; an allow-listed
/// column absent from the payload shape is an error.
pub fn select_columns<'a>(
    flat: &'a BTreeMap<String, Value>,
    allow_list: &[&'static str],
) -> Result<Vec<(&'static str, &'a Value)>, AppError> {
    allow_list
        .iter()
        .map(|&name| {
            flat.get(name).map(|v| (name, v)).ok_or_else(|| {
                AppError::BadRequest(format!("required column absent from payload: {}", name))
            })
        })
        .collect()
}

/// Coerce a JSON value to a cell with no declared type: booleans and
/// numbers map directly, strings stay text, and composite values are
/// serialized to text.
pub fn infer_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Int(i)
            } else {
                Cell::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Cell::Text(s.clone()),
        composite => Cell::Text(composite.to_string()),
    }
}

/// Coerce a JSON value to an integer cell.
pub fn int_cell(column: &str, value: &Value) -> Result<Cell, AppError> {
    match value {
        Value::Null => Ok(Cell::Null),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Cell::Int)
            .ok_or_else(|| bad_coercion(column, value, "integer")),
        _ => Err(bad_coercion(column, value, "integer")),
    }
}

/// Coerce a JSON value to a float cell.
pub fn float_cell(column: &str, value: &Value) -> Result<Cell, AppError> {
    match value {
        Value::Null => Ok(Cell::Null),
        Value::Number(n) => n
            .as_f64()
            .map(Cell::Float)
            .ok_or_else(|| bad_coercion(column, value, "float")),
        _ => Err(bad_coercion(column, value, "float")),
    }
}

/// Coerce a JSON value to a timestamp cell (RFC 3339, as Strava emits).
pub fn timestamp_cell(column: &str, value: &Value) -> Result<Cell, AppError> {
    match value {
        Value::Null => Ok(Cell::Null),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Cell::Timestamp(dt.with_timezone(&Utc)))
            .map_err(|_| bad_coercion(column, value, "timestamp")),
        _ => Err(bad_coercion(column, value, "timestamp")),
    }
}

fn bad_coercion(column: &str, value: &Value, wanted: &str) -> AppError {
    AppError::BadRequest(format!(
        "cannot coerce column {} value {} to {}",
        column, value, wanted
    ))
}
