//! CLI commands and argument parsing

use crate::selection::SelectionEvent;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Data app kit CLI
#[derive(Parser, Debug)]
#[command(name = "kbc-app-kit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// App configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Secrets file (YAML); `KBC_URL`-style environment variables fill the gaps
    #[arg(short, long, global = true)]
    pub secrets: Option<PathBuf>,

    /// Session file (JSON) kept between invocations
    #[arg(long, global = true)]
    pub session: Option<PathBuf>,

    /// Request header as `Name: value`, repeatable
    #[arg(short = 'H', long = "header", global = true)]
    pub headers: Vec<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether the request headers may use the app
    AuthCheck {
        /// Required role, overriding the configured one
        #[arg(long)]
        role: Option<String>,

        /// Log the resolved headers
        #[arg(long)]
        debug: bool,
    },

    /// List buckets
    Buckets,

    /// List the tables of a bucket
    Tables {
        /// Bucket id
        bucket: String,
    },

    /// Export a table
    Read {
        /// Table id
        table: String,

        /// Write the table to a file (`.csv` or `.parquet`) instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a CSV file into a table
    Write {
        /// Table id
        table: String,

        /// CSV file with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Append instead of replacing the table contents
        #[arg(long)]
        incremental: bool,
    },

    /// Record a usage event
    Event {
        #[arg(long)]
        message: Option<String>,

        #[arg(long)]
        endpoint: Option<String>,

        #[arg(long)]
        data: Option<String>,

        #[arg(long)]
        job_id: Option<u64>,
    },

    /// Drive the bucket and table picker one step
    Select {
        /// What the user did
        #[arg(long, value_enum, default_value = "refresh")]
        action: SelectAction,

        /// Bucket or table id for `pick-bucket` / `pick-table`
        id: Option<String>,
    },

    /// Run SQL against the warehouse
    Query {
        sql: String,

        /// Execute only, do not fetch a result
        #[arg(long)]
        no_result: bool,
    },
}

/// Picker interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SelectAction {
    Refresh,
    Reconnect,
    PickBucket,
    PickTable,
    ClearTable,
}

impl SelectAction {
    /// Event for this action; picks need an id
    pub fn into_event(self, id: Option<String>) -> Option<SelectionEvent> {
        Some(match self {
            Self::Refresh => SelectionEvent::Refresh,
            Self::Reconnect => SelectionEvent::Reconnect,
            Self::ClearTable => SelectionEvent::ClearTable,
            Self::PickBucket => SelectionEvent::PickBucket(id?),
            Self::PickTable => SelectionEvent::PickTable(id?),
        })
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
    /// CSV for tables, JSON otherwise
    Csv,
}
