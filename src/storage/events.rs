//! Usage events
//!
//! Every read, write or explicit event call records who did what from which
//! app. The user and application come from the proxy headers of the session.

use crate::auth::RequestHeaders;
use chrono::{DateTime, Local, TimeZone};
use serde_json::{json, Value};

/// Component every data-app event is filed under
pub const EVENT_COMPONENT: &str = "keboola.data-apps";
/// Event type recorded in the params
pub const EVENT_TYPE: &str = "keboola_data_app_write";
/// Placeholder when a header is missing
pub const UNKNOWN: &str = "Unknown";

pub const DEFAULT_EVENT_MESSAGE: &str = "Data App Create Event";
pub const DEFAULT_EVENT_ENDPOINT: &str = "/v2/storage/events/create";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An event to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    pub message: String,
    pub endpoint: String,
    pub data: Option<String>,
    pub job_id: Option<u64>,
}

impl Default for EventRequest {
    fn default() -> Self {
        Self {
            message: DEFAULT_EVENT_MESSAGE.to_string(),
            endpoint: DEFAULT_EVENT_ENDPOINT.to_string(),
            data: None,
            job_id: None,
        }
    }
}

impl EventRequest {
    pub fn new(message: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Attach free-form data
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attach the job the event relates to
    #[must_use]
    pub fn with_job_id(mut self, job_id: Option<u64>) -> Self {
        self.job_id = job_id;
        self
    }

    /// Build the `POST /v2/storage/events` body at the current local time
    pub fn payload(&self, headers: &RequestHeaders) -> Value {
        self.payload_at(headers, &Local::now())
    }

    /// Build the event body for a given time
    pub fn payload_at<Tz: TimeZone>(&self, headers: &RequestHeaders, time: &DateTime<Tz>) -> Value
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut params = json!({
            "user": headers.user_email().unwrap_or(UNKNOWN),
            "time": time.format(TIME_FORMAT).to_string(),
            "endpoint": self.endpoint,
            "event_type": EVENT_TYPE,
            "event_application": headers.origin().unwrap_or(UNKNOWN),
        });

        if let Some(ref data) = self.data {
            params["event_data"] = json!({ "data": data });
        }
        if let Some(job_id) = self.job_id {
            params["event_job_id"] = json!(job_id);
        }

        json!({
            "message": self.message,
            "component": EVENT_COMPONENT,
            "params": params,
        })
    }
}
