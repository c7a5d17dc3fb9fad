//! Conversion of extracted records into typed destination rows
//!
//! An extracted record is a flat JSON object keyed by legacy column names.
//! This module turns it into an ordered row of [`DbValue`]s matching the
//! destination column order, applying the shared normalization from
//! [`crate::transform`] and validating destination NOT NULL constraints.

use crate::error::RecordError;
use crate::tables::{ColumnKind, ColumnSpec, TableSpec};
use crate::transform;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A value ready to bind to either destination backend
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// One record as read from a JSONL artifact
pub type SourceRecord = Map<String, Value>;

/// A typed destination row, in the table's destination column order
#[derive(Debug, Clone)]
pub struct Row {
    /// Legacy primary key (preserved 1:1 as the destination key)
    pub id: i64,
    pub values: Vec<DbValue>,
}

/// Build a destination row from one extracted record.
///
/// The primary key must be present and integral; for other columns a
/// missing or unconvertible value becomes NULL unless the destination
/// column is NOT NULL, in which case the record fails validation and its
/// containing batch will be marked failed.
pub fn build_row(spec: &TableSpec, record: &SourceRecord) -> Result<Row, RecordError> {
    let id = record
        .get(spec.primary_key)
        .and_then(int_value)
        .ok_or(RecordError::MissingPrimaryKey {
            column: spec.primary_key,
        })?;

    let mut values = Vec::with_capacity(spec.columns.len());
    for column in spec.columns {
        values.push(convert_column(column, record, id)?);
    }

    Ok(Row { id, values })
}

fn convert_column(
    column: &ColumnSpec,
    record: &SourceRecord,
    id: i64,
) -> Result<DbValue, RecordError> {
    let raw = record.get(column.legacy).unwrap_or(&Value::Null);

    let value = match column.kind {
        ColumnKind::Int => int_value(raw).map(DbValue::Int),
        ColumnKind::BigId => transform::normalize_big_id(raw).map(DbValue::Int),
        ColumnKind::Float => float_value(raw).map(DbValue::Float),
        ColumnKind::Text => text_value(raw).map(DbValue::Text),
        ColumnKind::Bool => transform::normalize_bool(raw).map(DbValue::Bool),
        ColumnKind::Timestamp => transform::normalize_timestamp(raw).map(DbValue::Timestamp),
    };

    match value {
        Some(v) => Ok(v),
        None if column.required => {
            // Distinguish "nothing there" from "there but unusable" in the
            // error message; both fail the record.
            if raw.is_null() {
                Err(RecordError::MissingRequired {
                    id,
                    column: column.dest,
                })
            } else {
                Err(RecordError::InvalidValue {
                    id,
                    column: column.dest,
                    detail: format!("cannot convert {raw}"),
                })
            }
        }
        None => Ok(DbValue::Null),
    }
}

fn int_value(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_value(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        // Legacy exports occasionally render codes as bare numbers
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
