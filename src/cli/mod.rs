//! CLI module
//!
//! Command-line interface over the data app facade.
//!
//! # Commands
//!
//! - `auth-check` - Gate the given request headers
//! - `buckets` / `tables` - Browse Storage
//! - `read` / `write` - Move table data
//! - `event` - Record a usage event
//! - `select` - Drive the table picker, state kept in `--session`
//! - `query` - Run SQL on the warehouse

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, SelectAction};
pub use runner::Runner;
