//! # kbc-app-kit
//!
//! Storage API integration for data apps running behind the sign-in proxy.
//!
//! ## Features
//!
//! - **Access gate**: allow or stop a render based on the forwarded identity
//!   and an optional required role
//! - **Table picker**: a bucket then table selection kept in the session
//! - **Table I/O**: export tables into Arrow frames and load frames back
//! - **Usage events**: every read and write is recorded as a Storage event
//! - **Warehouse**: DuckDB session for SQL over frames
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kbc_app_kit::{DataApp, Secrets, SelectionEvent, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> kbc_app_kit::Result<()> {
//!     let secrets = Secrets::from_file(".secrets.yaml")?;
//!     let app = DataApp::from_secrets(&secrets)?;
//!
//!     // Stop here when the user may not use the app
//!     app.auth_check(&headers, false)?;
//!
//!     let session = SessionStore::in_memory();
//!     let picked = app
//!         .add_table_selection(&headers, &session, SelectionEvent::Refresh)
//!         .await?;
//!     println!("{}", picked.frame);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           DataApp                               │
//! │  auth_check()   add_table_selection()   read/write_table()      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │ Selection │    Storage    │   Frame   │  Warehouse  │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Identity │ Buckets   │ Buckets/Tables│ CSV       │ DuckDB      │
//! │ Gate     │ Tables    │ Export/Import │ JSON rows │ Arrow I/O   │
//! │ Token    │ Session   │ Jobs, Events  │ Parquet   │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

pub mod error;
pub mod types;

/// Proxy identity, access gate and Storage API token
pub mod auth;
pub mod http;
pub mod config;
/// Per-session state and app secrets
pub mod session;
pub mod frame;
pub mod storage;
/// Bucket then table picker
pub mod selection;
pub mod warehouse;
pub mod app;
pub mod cli;

pub use error::{Error, Result};
pub use types::*;

pub use app::DataApp;
pub use auth::{AuthGate, Decision, DenyReason, RequestHeaders, SessionIdentity};
pub use config::AppConfig;
pub use frame::TableFrame;
pub use selection::{SelectionEvent, SelectionView, TableSelection};
pub use session::{Secrets, SecretsProvider, SessionStore};
pub use storage::{EventRequest, StorageClient};
