//! The tabular frame exchanged with the host

use super::parquet_export::{write_batch, ParquetOptions};
use super::records::{batch_to_records, records_to_batch};
use crate::error::{Error, Result};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// Coarse column type as shown to app users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Date,
    Timestamp,
    Other(String),
}

impl From<&DataType> for ColumnType {
    fn from(data_type: &DataType) -> Self {
        match data_type {
            DataType::Null => Self::Null,
            DataType::Boolean => Self::Boolean,
            t if t.is_integer() => Self::Integer,
            t if t.is_floating() || matches!(t, DataType::Decimal128(..) | DataType::Decimal256(..)) => {
                Self::Float
            }
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Self::String,
            DataType::Date32 | DataType::Date64 => Self::Date,
            DataType::Timestamp(..) => Self::Timestamp,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Column name and type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// An in-memory table: named, typed columns and their rows
///
/// Backed by a single Arrow [`RecordBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableFrame {
    batch: RecordBatch,
}

impl TableFrame {
    /// A frame with no columns and no rows
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenate batches sharing one schema
    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        Ok(Self::new(concat_batches(&schema, batches)?))
    }

    /// Parse CSV with a header row; column types are inferred
    pub fn from_csv(data: &[u8]) -> Result<Self> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty());
        }

        let format = Format::default().with_header(true);
        let (schema, _) = format.infer_schema(Cursor::new(data), None)?;
        let schema = Arc::new(schema);

        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_format(format)
            .build(Cursor::new(data))?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

        Self::from_batches(schema, &batches)
    }

    /// Read a CSV file with a header row
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            Error::frame(format!("Failed to read CSV file '{}': {e}", path.display()))
        })?;
        Self::from_csv(&data)
    }

    /// Build from JSON objects, one per row
    pub fn from_records(records: &[Value]) -> Result<Self> {
        records_to_batch(records).map(Self::new)
    }

    /// Rows as JSON objects
    pub fn to_records(&self) -> Result<Vec<Value>> {
        batch_to_records(&self.batch)
    }

    /// Serialize as CSV with a header row
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        if self.batch.num_columns() == 0 {
            return Ok(Vec::new());
        }

        let mut writer = WriterBuilder::new().with_header(true).build(Vec::new());
        writer.write(&self.batch)?;
        Ok(writer.into_inner())
    }

    /// Write as CSV with a header row
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_csv()?).map_err(|e| {
            Error::frame(format!("Failed to write CSV file '{}': {e}", path.display()))
        })
    }

    /// Write as a Parquet file, returning the number of rows written
    pub fn write_parquet(&self, path: impl AsRef<Path>, options: &ParquetOptions) -> Result<usize> {
        if self.batch.num_columns() == 0 {
            return Err(Error::frame("Cannot write a frame without columns to Parquet"));
        }
        write_batch(path.as_ref(), &self.batch, options)
    }

    /// Render as a text table
    pub fn pretty(&self) -> Result<String> {
        if self.batch.num_columns() == 0 {
            return Ok(String::new());
        }
        Ok(pretty_format_batches(std::slice::from_ref(&self.batch))?.to_string())
    }

    /// First `n` rows; the whole frame when it is shorter
    pub fn head(&self, n: usize) -> Self {
        let len = n.min(self.batch.num_rows());
        Self {
            batch: self.batch.slice(0, len),
        }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| Column {
                name: f.name().clone(),
                column_type: ColumnType::from(f.data_type()),
            })
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// No rows (a frame may still have columns)
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }
}

impl Default for TableFrame {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<RecordBatch> for TableFrame {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}

impl fmt::Display for TableFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pretty() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(
                f,
                "TableFrame({} rows x {} columns)",
                self.num_rows(),
                self.num_columns()
            ),
        }
    }
}
