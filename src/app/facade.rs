//! The [`DataApp`] facade
//!
//! Combines the access gate, the Storage API client, the table picker and
//! the optional warehouse behind the calls a data app makes while rendering.
//! Data-access failures come back as [`UserMessage`]s next to an empty value;
//! only access denials and session persistence failures are errors.

use crate::auth::{AuthGate, RequestHeaders, SessionIdentity, SIGN_OUT_PATH};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::frame::TableFrame;
use crate::selection::{SelectionEvent, SelectionView, TableSelection};
use crate::session::{SecretsProvider, SessionStore};
use crate::storage::{EventRequest, EventResponse, StorageClient, OPERATION_TABLE_IMPORT};
use crate::types::{Placement, Reported, UserMessage, WriteMode};
use crate::warehouse::WarehouseSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Event message recorded after a table read
pub const READ_EVENT_MESSAGE: &str = "Data App Read Table";
/// Event endpoint recorded after a table read
pub const READ_EVENT_ENDPOINT: &str = "/v2/storage/tables/export_to_file";
/// Event message recorded after a table write
pub const WRITE_EVENT_MESSAGE: &str = "Data App Write Table";
/// Event endpoint recorded after a table write
pub const WRITE_EVENT_ENDPOINT: &str = "/v2/storage/tables/load";
/// Rows of the written frame rendered into the write event
pub const EVENT_PREVIEW_ROWS: usize = 50;

/// Signed-in user line plus the sign-out link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutLink {
    pub label: String,
    pub href: String,
    pub placement: Placement,
}

/// Result of [`DataApp::add_table_selection`]
#[derive(Debug, Clone)]
pub struct TableSelectionOutput {
    pub view: SelectionView,
    /// Data of the chosen table; empty until a table is chosen
    pub frame: TableFrame,
}

/// Data app integration facade
#[derive(Debug, Clone)]
pub struct DataApp {
    config: AppConfig,
    storage: StorageClient,
    gate: AuthGate,
    selection: TableSelection,
    dev_mockup_headers: Option<RequestHeaders>,
    frames: Arc<RwLock<HashMap<String, TableFrame>>>,
}

impl DataApp {
    /// Create the facade from a validated config
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let storage = StorageClient::new(config.storage.clone())?;
        let gate = AuthGate::new(config.auth.required_role.clone());
        let selection = TableSelection::new(config.selection);

        info!(
            root_url = storage.root_url(),
            role_gated = gate.required_role().is_some(),
            "Data app initialized"
        );

        Ok(Self {
            config,
            storage,
            gate,
            selection,
            dev_mockup_headers: None,
            frames: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Create the facade from app secrets
    pub fn from_secrets(secrets: &dyn SecretsProvider) -> Result<Self> {
        Self::new(AppConfig::from_secrets(secrets)?)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn selection(&self) -> &TableSelection {
        &self.selection
    }

    // ========================================================================
    // Headers + access
    // ========================================================================

    /// Headers used when the app runs without the sign-in proxy
    pub fn set_dev_mockup_headers(&mut self, headers: RequestHeaders) {
        self.dev_mockup_headers = Some(headers);
    }

    /// Headers of the current request
    ///
    /// Proxied headers win; otherwise the dev mock-up headers, otherwise none.
    pub fn resolve_headers(&self, live: &RequestHeaders) -> RequestHeaders {
        if live.is_proxied() {
            live.clone()
        } else {
            self.dev_mockup_headers.clone().unwrap_or_default()
        }
    }

    pub fn identity(&self, live: &RequestHeaders) -> SessionIdentity {
        SessionIdentity::from_headers(&self.resolve_headers(live))
    }

    /// Gate the render
    ///
    /// Returns [`Error::AccessDenied`] when the user may not use the app; the
    /// host must stop rendering and show the denial message.
    pub fn auth_check(&self, live: &RequestHeaders, debug: bool) -> Result<SessionIdentity> {
        let headers = self.resolve_headers(live);
        if debug {
            if headers.is_proxied() {
                debug!(headers = ?headers, "Resolved proxy headers");
            } else {
                debug!("Not using proxy");
            }
        }

        let identity = SessionIdentity::from_headers(&headers);
        self.gate.enforce(&identity)?;
        Ok(identity)
    }

    /// Logout affordance, shown only to proxied users
    pub fn logout_link(&self, live: &RequestHeaders) -> Option<LogoutLink> {
        let headers = self.resolve_headers(live);
        let email = headers.user_email()?;
        Some(LogoutLink {
            label: format!("Logged in as user: {email}"),
            href: SIGN_OUT_PATH.to_string(),
            placement: self.selection.placement(),
        })
    }

    // ========================================================================
    // Storage
    // ========================================================================

    /// Record a usage event as the current user
    pub async fn create_event(&self, live: &RequestHeaders, event: &EventRequest) -> Result<EventResponse> {
        let headers = self.resolve_headers(live);
        self.storage.create_event(event, &headers).await
    }

    /// Read a Storage table
    ///
    /// On failure the frame is empty and the error is reported as a message.
    pub async fn read_table(&self, live: &RequestHeaders, table_id: &str) -> Reported<TableFrame> {
        match self.storage.read_table(table_id).await {
            Ok((frame, export)) => {
                let event = EventRequest::new(READ_EVENT_MESSAGE, READ_EVENT_ENDPOINT)
                    .with_job_id(Some(export.job_id));
                self.record_event(live, &event).await;
                Reported::ok(frame)
            }
            Err(e) => {
                warn!(table = table_id, status = ?e.status(), error = %e, "Table read failed");
                Reported::failed(
                    TableFrame::empty(),
                    format!("An error occurred while retrieving data: {e}"),
                )
            }
        }
    }

    /// Load a frame into a Storage table
    pub async fn write_table(
        &self,
        live: &RequestHeaders,
        table_id: &str,
        frame: &TableFrame,
        mode: WriteMode,
    ) -> Reported<()> {
        match self.storage.write_table(table_id, frame, mode).await {
            Ok(imported) => {
                let job_id = self
                    .storage
                    .find_job_id(table_id, OPERATION_TABLE_IMPORT)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(table = table_id, error = %e, "Could not look up import job");
                        None
                    });
                let mut event = EventRequest::new(WRITE_EVENT_MESSAGE, WRITE_EVENT_ENDPOINT)
                    .with_job_id(job_id);
                if let Some(data) = event_table_preview(frame) {
                    event = event.with_data(data);
                }
                self.record_event(live, &event).await;

                self.frames.write().await.remove(table_id);
                let mut reported = Reported::ok(());
                reported.messages.extend(imported.warnings.iter().map(|w| {
                    UserMessage::warning(w.as_str().map_or_else(|| w.to_string(), ToString::to_string))
                }));
                reported
            }
            Err(e) => {
                warn!(table = table_id, status = ?e.status(), error = %e, "Table write failed");
                Reported::failed((), format!("Data upload failed with: {e}"))
            }
        }
    }

    /// Best-effort usage event
    async fn record_event(&self, live: &RequestHeaders, event: &EventRequest) {
        match self.create_event(live, event).await {
            Ok(response) if response.is_success() => {
                debug!(message = %event.message, job_id = ?event.job_id, "Recorded event");
            }
            Ok(response) => {
                warn!(status = response.status, body = %response.body, "Event was rejected");
            }
            Err(e) => warn!(error = %e, "Could not record event"),
        }
    }

    // ========================================================================
    // Table selection
    // ========================================================================

    /// Render the bucket and table picker and load the chosen table
    ///
    /// Loaded tables are kept until the user reconnects, so re-renders do
    /// not export the same table again.
    pub async fn add_table_selection(
        &self,
        live: &RequestHeaders,
        session: &SessionStore,
        event: SelectionEvent,
    ) -> Result<TableSelectionOutput> {
        if event == SelectionEvent::Reconnect {
            self.frames.write().await.clear();
        }

        let mut view = self.selection.render(&self.storage, session, event).await?;

        let frame = match view.resolved_table.clone() {
            Some(table_id) if !view.superseded => {
                self.cached_frame(live, &table_id, &mut view.messages).await
            }
            _ => TableFrame::empty(),
        };

        Ok(TableSelectionOutput { view, frame })
    }

    async fn cached_frame(
        &self,
        live: &RequestHeaders,
        table_id: &str,
        messages: &mut Vec<UserMessage>,
    ) -> TableFrame {
        if let Some(frame) = self.frames.read().await.get(table_id) {
            return frame.clone();
        }

        let reported = self.read_table(live, table_id).await;
        if !reported.has_errors() {
            self.frames
                .write()
                .await
                .insert(table_id.to_string(), reported.value.clone());
        }
        messages.extend(reported.messages);
        reported.value
    }

    /// Drop every loaded table
    pub async fn clear_cache(&self) {
        self.frames.write().await.clear();
    }

    // ========================================================================
    // Warehouse
    // ========================================================================

    /// Open the configured warehouse
    pub fn create_warehouse_session(&self) -> Result<WarehouseSession> {
        let config = self
            .config
            .warehouse
            .as_ref()
            .ok_or_else(|| Error::missing_field("warehouse"))?;
        WarehouseSession::create_session(config)
    }
}

/// Text table for the write event, cut to [`EVENT_PREVIEW_ROWS`] rows
pub(crate) fn event_table_preview(frame: &TableFrame) -> Option<String> {
    if frame.num_rows() <= EVENT_PREVIEW_ROWS {
        return frame.pretty().ok();
    }
    let text = frame.head(EVENT_PREVIEW_ROWS).pretty().ok()?;
    Some(format!(
        "{text}\n[{} rows x {} columns]",
        frame.num_rows(),
        frame.num_columns()
    ))
}
