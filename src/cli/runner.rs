//! CLI runner - executes commands

use crate::app::DataApp;
use crate::auth::RequestHeaders;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::frame::{ParquetOptions, TableFrame};
use crate::selection::SelectionEvent;
use crate::session::{EnvSecrets, LayeredSecrets, Secrets, SessionStore};
use crate::storage::{EventRequest, DEFAULT_EVENT_ENDPOINT, DEFAULT_EVENT_MESSAGE};
use crate::types::{UserMessage, WriteMode};
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::AuthCheck { role, debug } => self.auth_check(role.as_deref(), *debug),
            Commands::Buckets => self.buckets().await,
            Commands::Tables { bucket } => self.tables(bucket).await,
            Commands::Read { table, output } => self.read(table, output.as_deref()).await,
            Commands::Write {
                table,
                input,
                incremental,
            } => self.write(table, input, *incremental).await,
            Commands::Event {
                message,
                endpoint,
                data,
                job_id,
            } => {
                let mut event = EventRequest::new(
                    message.as_deref().unwrap_or(DEFAULT_EVENT_MESSAGE),
                    endpoint.as_deref().unwrap_or(DEFAULT_EVENT_ENDPOINT),
                )
                .with_job_id(*job_id);
                if let Some(data) = data {
                    event = event.with_data(data.clone());
                }
                self.event(&event).await
            }
            Commands::Select { action, id } => {
                let event = action.into_event(id.clone()).ok_or_else(|| {
                    Error::config("pick-bucket and pick-table need an id")
                })?;
                self.select(event).await
            }
            Commands::Query { sql, no_result } => self.query(sql, !*no_result),
        }
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// App config from `--config`, else from secrets
    fn load_config(&self) -> Result<AppConfig> {
        if let Some(path) = &self.cli.config {
            return AppConfig::from_file(path);
        }

        let mut secrets = LayeredSecrets::new();
        if let Some(path) = &self.cli.secrets {
            secrets = secrets.layer(Secrets::from_file(path)?);
        }
        AppConfig::from_secrets(&secrets.layer(EnvSecrets))
    }

    fn build_app(&self) -> Result<DataApp> {
        DataApp::new(self.load_config()?)
    }

    /// Headers given with `-H`
    fn request_headers(&self) -> Result<RequestHeaders> {
        let mut headers = RequestHeaders::new();
        for raw in &self.cli.headers {
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| Error::config(format!("Invalid header '{raw}', expected 'Name: value'")))?;
            headers.insert(name.trim(), value.trim());
        }
        Ok(headers)
    }

    fn load_session(&self) -> Result<SessionStore> {
        match &self.cli.session {
            Some(path) => SessionStore::from_file(path),
            None => Ok(SessionStore::in_memory()),
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn auth_check(&self, role: Option<&str>, debug: bool) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(role) = role {
            config = config.with_required_role(role);
        }
        let app = DataApp::new(config)?;
        let headers = self.request_headers()?;

        match app.auth_check(&headers, debug) {
            Ok(identity) => {
                self.output_message(&json!({
                    "type": "AUTH",
                    "auth": {"decision": "allow", "user": identity.token, "roles": identity.roles}
                }));
                if let Some(link) = app.logout_link(&headers) {
                    self.output_message(&json!({
                        "type": "LOGOUT",
                        "logout": {"label": link.label, "href": link.href}
                    }));
                }
                Ok(())
            }
            Err(Error::AccessDenied { reason }) => {
                self.output_message(&json!({
                    "type": "AUTH",
                    "auth": {"decision": "deny", "reason": reason, "message": reason.user_message()}
                }));
                Err(Error::AccessDenied { reason })
            }
            Err(e) => Err(e),
        }
    }

    async fn buckets(&self) -> Result<()> {
        let app = self.build_app()?;
        for bucket in app.storage().list_buckets().await? {
            self.output_message(&json!({"type": "BUCKET", "bucket": bucket}));
        }
        Ok(())
    }

    async fn tables(&self, bucket: &str) -> Result<()> {
        let app = self.build_app()?;
        for table in app.storage().list_tables(bucket).await? {
            self.output_message(&json!({
                "type": "TABLE",
                "table": {"id": table.qualified_id(), "name": &table.name, "label": table.label()}
            }));
        }
        Ok(())
    }

    async fn read(&self, table: &str, output: Option<&Path>) -> Result<()> {
        let app = self.build_app()?;
        let reported = app.read_table(&self.request_headers()?, table).await;
        self.report(&reported.messages)?;

        match output {
            Some(path) => {
                let frame = &reported.value;
                if path.extension().is_some_and(|ext| ext == "parquet") {
                    frame.write_parquet(path, &ParquetOptions::default())?;
                } else {
                    frame.write_csv(path)?;
                }
                self.output_message(&json!({
                    "type": "FILE",
                    "file": {"path": path.display().to_string(), "rows": frame.num_rows()}
                }));
                Ok(())
            }
            None => self.output_frame(&reported.value),
        }
    }

    async fn write(&self, table: &str, input: &Path, incremental: bool) -> Result<()> {
        let app = self.build_app()?;
        let frame = TableFrame::from_csv_path(input)?;
        let reported = app
            .write_table(
                &self.request_headers()?,
                table,
                &frame,
                WriteMode::from_incremental(incremental),
            )
            .await;
        self.report(&reported.messages)?;
        self.output_message(&json!({
            "type": "WRITE",
            "write": {"table": table, "rows": frame.num_rows(), "incremental": incremental}
        }));
        Ok(())
    }

    async fn event(&self, event: &EventRequest) -> Result<()> {
        let app = self.build_app()?;
        let response = app.create_event(&self.request_headers()?, event).await?;
        self.output_message(&json!({
            "type": "EVENT",
            "event": {"status": response.status, "body": &response.body}
        }));
        if response.is_success() {
            Ok(())
        } else {
            Err(Error::http_status(response.status, response.body))
        }
    }

    async fn select(&self, event: SelectionEvent) -> Result<()> {
        let app = self.build_app()?;
        let session = self.load_session()?;
        let output = app
            .add_table_selection(&self.request_headers()?, &session, event)
            .await?;

        let view = serde_json::to_value(&output.view)?;
        self.output_message(&json!({"type": "SELECTION", "selection": view}));
        if output.view.resolved_table.is_some() {
            self.output_frame(&output.frame)?;
        }
        self.report(&output.view.messages)
    }

    fn query(&self, sql: &str, return_df: bool) -> Result<()> {
        let app = self.build_app()?;
        let warehouse = app.create_warehouse_session()?;
        let frame = warehouse.execute_query(sql, return_df)?;
        if return_df {
            self.output_frame(&frame)
        } else {
            self.output_message(&json!({"type": "QUERY", "query": {"status": "ok"}}));
            Ok(())
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Print user messages; the first error fails the command
    fn report(&self, messages: &[UserMessage]) -> Result<()> {
        for message in messages {
            self.output_message(&json!({"type": "MESSAGE", "message": message}));
        }
        match messages.iter().find(|m| m.is_error()) {
            Some(error) => Err(Error::Other(error.text.clone())),
            None => Ok(()),
        }
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json | OutputFormat::Csv => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }

    /// Output table rows
    fn output_frame(&self, frame: &TableFrame) -> Result<()> {
        match self.cli.format {
            OutputFormat::Json => {
                for record in frame.to_records()? {
                    self.output_message(&json!({"type": "RECORD", "record": record}));
                }
            }
            OutputFormat::Pretty => println!("{}", frame.pretty()?),
            OutputFormat::Csv => std::io::stdout().write_all(&frame.to_csv()?)?,
        }
        Ok(())
    }
}
