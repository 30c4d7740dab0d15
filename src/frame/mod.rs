//! Tabular frames
//!
//! [`TableFrame`] is how table data crosses the crate boundary: the Storage
//! client parses exports into frames, writes serialize frames to CSV, and the
//! warehouse reads and writes them as Arrow batches.

mod parquet_export;
mod records;
mod table;

pub use parquet_export::ParquetOptions;
pub use records::{batch_to_records, infer_schema, records_to_batch};
pub use table::{Column, ColumnType, TableFrame};
