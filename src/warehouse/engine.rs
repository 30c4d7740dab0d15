//! DuckDB-backed warehouse session
//!
//! Frames cross into DuckDB through the Arrow appender and come back out
//! through `query_arrow`, so no row-by-row value conversion happens here.
//! Both sides share duckdb's arrow, which Cargo.toml pins to the crate's.

use crate::error::{Error, Result};
use crate::frame::TableFrame;
use crate::types::WriteMode;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use duckdb::{AccessMode, Config, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// In-memory database path
pub const IN_MEMORY: &str = ":memory:";

/// Warehouse connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Database file, or `:memory:`
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub read_only: bool,

    /// Schema used for table names without one
    #[serde(default)]
    pub schema: Option<String>,
}

fn default_database() -> String {
    IN_MEMORY.to_string()
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::new(IN_MEMORY)
    }
}

impl WarehouseConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            read_only: false,
            schema: None,
        }
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.is_empty() || self.database == IN_MEMORY
    }
}

/// An open warehouse connection
pub struct WarehouseSession {
    conn: Connection,
    config: WarehouseConfig,
}

impl std::fmt::Debug for WarehouseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseSession")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WarehouseSession {
    /// Open the configured database
    pub fn create_session(config: &WarehouseConfig) -> Result<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            let mode = if config.read_only {
                AccessMode::ReadOnly
            } else {
                AccessMode::ReadWrite
            };
            Config::default()
                .access_mode(mode)
                .and_then(|flags| Connection::open_with_flags(&config.database, flags))
        }
        .map_err(|e| {
            Error::invalid_value(
                "warehouse.database",
                format!("Failed to open '{}': {e}", config.database),
            )
        })?;

        let session = Self {
            conn,
            config: config.clone(),
        };

        if let Some(ref schema) = config.schema {
            if !config.read_only {
                session
                    .conn
                    .execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(schema)))?;
            }
            session
                .conn
                .execute_batch(&format!("SET schema = '{}';", schema.replace('\'', "''")))?;
        }

        debug!(database = %config.database, read_only = config.read_only, "Opened warehouse session");
        Ok(session)
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Whole table as a frame
    pub fn read_table(&self, table: &str) -> Result<TableFrame> {
        let sql = format!("SELECT * FROM {}", self.qualified_name(table));
        self.query_frame(&sql)
    }

    /// Run SQL; the result is materialized only when `return_df` is set
    pub fn execute_query(&self, sql: &str, return_df: bool) -> Result<TableFrame> {
        debug!("Executing query: {}", sql);
        if return_df {
            self.query_frame(sql)
        } else {
            self.conn.execute_batch(sql)?;
            Ok(TableFrame::empty())
        }
    }

    /// Store a frame as a table
    ///
    /// `Overwrite` replaces the table, `Incremental` appends to it and creates
    /// it when missing. A schema in the name is created when missing.
    /// Returns the number of rows written.
    pub fn write_table(&self, frame: &TableFrame, table: &str, mode: WriteMode) -> Result<usize> {
        if frame.num_columns() == 0 {
            return Err(Error::frame(format!(
                "Cannot write a frame without columns to '{table}'"
            )));
        }

        let batch = appendable(frame.batch())?;
        let (schema, table_name) = self.split_name(table);
        if let Some(schema) = schema {
            self.conn
                .execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(schema)))?;
        }
        let name = self.qualified_name(table);
        let columns: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name()), sql_type(f.data_type())))
            .collect();
        let create = if mode.is_incremental() {
            "CREATE TABLE IF NOT EXISTS"
        } else {
            "CREATE OR REPLACE TABLE"
        };
        self.conn
            .execute_batch(&format!("{create} {name} ({});", columns.join(", ")))?;

        let mut appender = match schema {
            Some(schema) => self.conn.appender_to_db(table_name, schema)?,
            None => self.conn.appender(table_name)?,
        };
        let rows = batch.num_rows();
        appender.append_record_batch(batch)?;
        appender.flush()?;

        info!(
            table = %name,
            rows,
            incremental = mode.is_incremental(),
            "Wrote warehouse table"
        );
        Ok(rows)
    }

    /// `schema.table` names of every table in the database
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_schema || '.' || table_name AS full_name
             FROM information_schema.tables
             WHERE table_catalog = current_database()
             ORDER BY table_schema, table_name",
        )?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    fn query_frame(&self, sql: &str) -> Result<TableFrame> {
        let mut stmt = self.conn.prepare(sql)?;
        let arrow = stmt.query_arrow([])?;
        let schema = arrow.get_schema();
        let batches: Vec<RecordBatch> = arrow.collect();
        TableFrame::from_batches(schema, &batches)
    }

    fn split_name<'a>(&'a self, table: &'a str) -> (Option<&'a str>, &'a str) {
        match table.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (self.config.schema.as_deref(), table),
        }
    }

    fn qualified_name(&self, table: &str) -> String {
        match self.split_name(table) {
            (Some(schema), name) => format!("{}.{}", quote_ident(schema), quote_ident(name)),
            (None, name) => quote_ident(name),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// DuckDB column type for an appendable Arrow type
fn sql_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::UInt8 => "UTINYINT",
        DataType::UInt16 => "USMALLINT",
        DataType::UInt32 => "UINTEGER",
        DataType::UInt64 => "UBIGINT",
        DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Date32 => "DATE",
        _ => "VARCHAR",
    }
}

/// Cast columns the appender cannot take (nulls, timestamps, nested) to text
fn appendable(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if sql_type(field.data_type()) == "VARCHAR" && field.data_type() != &DataType::Utf8 {
            columns.push(cast(column, &DataType::Utf8)?);
            fields.push(Field::new(field.name(), DataType::Utf8, true));
        } else {
            columns.push(Arc::clone(column));
            fields.push(field.as_ref().clone());
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
