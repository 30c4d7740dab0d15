//! Warehouse pass-through
//!
//! A warehouse session is a DuckDB connection (in-memory or file backed)
//! exposing four calls: open, read a table, run SQL and write a frame.
//!
//! ```rust,ignore
//! use kbc_app_kit::warehouse::{WarehouseConfig, WarehouseSession};
//!
//! let session = WarehouseSession::create_session(&WarehouseConfig::default())?;
//! session.write_table(&frame, "analytics.orders", WriteMode::Overwrite)?;
//! let totals = session.execute_query("SELECT sum(amount) FROM analytics.orders", true)?;
//! ```

mod engine;

pub use engine::{WarehouseConfig, WarehouseSession, IN_MEMORY};

#[cfg(test)]
mod tests;
