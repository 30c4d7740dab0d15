//! Error types for kbc-app-kit
//!
//! Every public API returns `Result<T, Error>`. Access denials halt the
//! current render (see [`Error::halts_app`]); everything else is reported to
//! the user without stopping the app.

use crate::auth::DenyReason;
use serde::Deserialize;
use thiserror::Error;

/// The main error type for kbc-app-kit
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Access Errors
    // ============================================================================
    #[error("Access denied: {reason}")]
    AccessDenied { reason: DenyReason },

    // ============================================================================
    // HTTP / Storage API Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Storage API error {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Job Errors
    // ============================================================================
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: u64, message: String },

    #[error("Job {job_id} did not finish within {waited_secs}s")]
    JobTimeout { job_id: u64, waited_secs: u64 },

    // ============================================================================
    // Data Errors
    // ============================================================================
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Frame error: {message}")]
    Frame { message: String },

    // ============================================================================
    // Warehouse Errors
    // ============================================================================
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] duckdb::Error),

    // ============================================================================
    // Session Errors
    // ============================================================================
    #[error("Session error: {message}")]
    Session { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

/// Error body returned by the Storage API on 4xx/5xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an access denied error
    pub fn access_denied(reason: DenyReason) -> Self {
        Self::AccessDenied { reason }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a frame error
    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Turn a raw HTTP status error into a structured API error when the body
    /// carries the Storage API error shape
    pub fn into_api_error(self) -> Self {
        match self {
            Error::HttpStatus { status, body } => match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(parsed) => Error::Api {
                    status,
                    code: parsed.code,
                    message: parsed.error,
                },
                Err(_) => Error::HttpStatus { status, body },
            },
            other => other,
        }
    }

    /// Whether this error must stop the current render of the app
    pub fn halts_app(&self) -> bool {
        matches!(self, Error::AccessDenied { .. })
    }

    /// HTTP status behind a Storage API failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } | Error::Api { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for kbc-app-kit
pub type Result<T> = std::result::Result<T, Error>;
