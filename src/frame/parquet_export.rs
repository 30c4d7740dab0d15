//! Parquet export of frames

use crate::error::{Error, Result};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;

/// Options for writing a frame to Parquet
#[derive(Debug, Clone)]
pub struct ParquetOptions {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024,
        }
    }
}

impl ParquetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use ZSTD compression
    #[must_use]
    pub fn zstd(mut self) -> Self {
        self.compression = Compression::ZSTD(ZstdLevel::default());
        self
    }

    /// Use no compression
    #[must_use]
    pub fn uncompressed(mut self) -> Self {
        self.compression = Compression::UNCOMPRESSED;
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// Write one batch to a Parquet file, returning the number of rows written
pub(crate) fn write_batch(
    path: &Path,
    batch: &RecordBatch,
    options: &ParquetOptions,
) -> Result<usize> {
    let file = File::create(path).map_err(|e| {
        Error::frame(format!(
            "Failed to create Parquet file '{}': {e}",
            path.display()
        ))
    })?;

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(options.properties()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(batch.num_rows())
}
