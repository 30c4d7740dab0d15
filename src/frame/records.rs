//! JSON records to and from Arrow
//!
//! Frames are flat tables, so nested JSON (arrays, objects) is stored as its
//! JSON text in a string column.

use crate::error::{Error, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, NullArray, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::json::writer::JsonArray;
use arrow::json::WriterBuilder;
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::sync::Arc;

/// Infer a flat schema from JSON objects
///
/// Columns keep the order in which keys are first seen.
pub fn infer_schema(records: &[Value]) -> Result<Schema> {
    let mut columns: Vec<(String, DataType)> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let Value::Object(obj) = record else {
            return Err(Error::frame(format!("Record {idx} is not a JSON object")));
        };
        for (key, value) in obj {
            let inferred = infer_type(value);
            match columns.iter_mut().find(|(name, _)| name == key) {
                Some((_, existing)) => *existing = merge_types(existing, &inferred),
                None => columns.push((key.clone(), inferred)),
            }
        }
    }

    let fields: Vec<Field> = columns
        .into_iter()
        .map(|(name, dtype)| Field::new(name, dtype, true))
        .collect();

    Ok(Schema::new(fields))
}

/// Convert JSON objects into a record batch
pub fn records_to_batch(records: &[Value]) -> Result<RecordBatch> {
    let schema = Arc::new(infer_schema(records)?);

    if records.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values: Vec<Option<&Value>> = records
                .iter()
                .map(|record| record.get(field.name()))
                .collect();
            build_array(&values, field.data_type())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Convert a record batch into JSON objects, one per row
///
/// Null cells are kept as explicit `null` values.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Value>> {
    if batch.num_columns() == 0 {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    writer.write(batch)?;
    writer.finish()?;
    let buf = writer.into_inner();

    let rows: Vec<Value> = serde_json::from_slice(&buf)?;
    Ok(rows)
}

fn infer_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) if n.is_i64() => DataType::Int64,
        Value::Number(_) => DataType::Float64,
        Value::String(_) | Value::Array(_) | Value::Object(_) => DataType::Utf8,
    }
}

fn merge_types(existing: &DataType, other: &DataType) -> DataType {
    match (existing, other) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

fn build_array(values: &[Option<&Value>], data_type: &DataType) -> Result<ArrayRef> {
    let array: ArrayRef = match data_type {
        DataType::Null => Arc::new(NullArray::new(values.len())),
        DataType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(Value::as_bool))
                .collect::<BooleanArray>(),
        ),
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(Value::as_i64))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(Value::as_f64))
                .collect::<Float64Array>(),
        ),
        DataType::Utf8 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                })
                .collect::<StringArray>(),
        ),
        other => {
            return Err(Error::frame(format!(
                "Cannot build a column of type {other} from JSON"
            )))
        }
    };
    Ok(array)
}
