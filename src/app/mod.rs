//! Data app entry point
//!
//! [`DataApp`] is what a data app holds for its lifetime. A typical render:
//!
//! ```rust,ignore
//! let app = DataApp::from_secrets(&secrets)?;
//! app.auth_check(&headers, false)?;
//! let picked = app
//!     .add_table_selection(&headers, &session, SelectionEvent::Refresh)
//!     .await?;
//! for message in &picked.view.messages {
//!     ui.show(message);
//! }
//! ```

mod facade;

pub use facade::{
    DataApp, LogoutLink, TableSelectionOutput, EVENT_PREVIEW_ROWS, READ_EVENT_ENDPOINT,
    READ_EVENT_MESSAGE, WRITE_EVENT_ENDPOINT, WRITE_EVENT_MESSAGE,
};

#[cfg(test)]
mod tests;
