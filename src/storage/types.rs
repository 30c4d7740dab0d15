//! Storage API records
//!
//! Wire shapes are deserialized into private `Raw*` structs and converted into
//! the descriptors the rest of the crate works with.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// Buckets
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBucket {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub source_bucket: Option<serde_json::Value>,
}

/// A bucket as offered in the picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDescriptor {
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
    /// Shared from another project
    #[serde(default)]
    pub linked: bool,
}

impl BucketDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            id: id.into(),
            name: display_name.clone(),
            display_name: Some(display_name),
            linked: false,
        }
    }

    #[must_use]
    pub fn linked(mut self, linked: bool) -> Self {
        self.linked = linked;
        self
    }

    /// Name shown to users
    pub fn label(&self) -> &str {
        label(self.display_name.as_deref(), &self.name, &self.id)
    }
}

impl From<RawBucket> for BucketDescriptor {
    fn from(raw: RawBucket) -> Self {
        Self {
            linked: raw.source_bucket.as_ref().is_some_and(|v| !v.is_null()),
            id: raw.id,
            name: raw.name,
            display_name: raw.display_name,
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RawBucketRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTable {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bucket: Option<RawBucketRef>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub rows_count: Option<u64>,
    #[serde(default)]
    pub last_import_date: Option<String>,
}

/// A table as offered in the picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub bucket_id: String,
}

impl TableDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        bucket_id: impl Into<String>,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            id: id.into(),
            name: display_name.clone(),
            display_name: Some(display_name),
            bucket_id: bucket_id.into(),
        }
    }

    /// Name shown to users
    pub fn label(&self) -> &str {
        label(self.display_name.as_deref(), &self.name, &self.id)
    }

    /// Fully qualified id, `{bucket_id}.{table}`
    ///
    /// Storage already returns qualified ids; short ids are prefixed with the
    /// owning bucket.
    pub fn qualified_id(&self) -> String {
        if table_in_bucket(&self.id, &self.bucket_id) {
            self.id.clone()
        } else {
            format!("{}.{}", self.bucket_id, self.id)
        }
    }

    /// Whether `id` names this table, short or qualified
    pub fn matches(&self, id: &str) -> bool {
        self.id == id || self.qualified_id() == id
    }

    pub(crate) fn from_raw(raw: RawTable, bucket_id: &str) -> Self {
        Self {
            bucket_id: raw
                .bucket
                .map(|b| b.id)
                .unwrap_or_else(|| bucket_id.to_string()),
            id: raw.id,
            name: raw.name,
            display_name: raw.display_name,
        }
    }
}

/// Whether a qualified table id belongs to a bucket
pub fn table_in_bucket(table_id: &str, bucket_id: &str) -> bool {
    !bucket_id.is_empty()
        && table_id
            .strip_prefix(bucket_id)
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('.'))
}

/// Table detail (`GET /v2/storage/tables/{id}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDetail {
    pub id: String,
    pub name: String,
    pub bucket_id: Option<String>,
    pub columns: Vec<String>,
    pub primary_key: Vec<String>,
    pub rows_count: Option<u64>,
    pub last_import_date: Option<String>,
}

impl From<RawTable> for TableDetail {
    fn from(raw: RawTable) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            bucket_id: raw.bucket.map(|b| b.id),
            columns: raw.columns,
            primary_key: raw.primary_key,
            rows_count: raw.rows_count,
            last_import_date: raw.last_import_date,
        }
    }
}

fn label<'a>(display_name: Option<&'a str>, name: &'a str, id: &'a str) -> &'a str {
    display_name
        .filter(|s| !s.is_empty())
        .or(Some(name).filter(|s| !s.is_empty()))
        .unwrap_or(id)
}

// ============================================================================
// Jobs
// ============================================================================

/// Status of a Storage job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Processing,
    Success,
    Error,
    Cancelled,
    Terminated,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Job will not change anymore
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::Cancelled | Self::Terminated
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Error detail attached to a failed job
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// File produced by an export job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFileRef {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
}

/// Results of a finished job
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobResults {
    #[serde(default)]
    pub file: Option<JobFileRef>,
}

/// A Storage job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub status: JobStatus,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default, deserialize_with = "de_results")]
    pub results: JobResults,
    #[serde(default)]
    pub error: Option<JobError>,
}

impl Job {
    /// Id of the exported file, if the job produced one
    pub fn file_id(&self) -> Option<u64> {
        self.results.file.as_ref().map(|f| f.id)
    }

    /// Failure message, falling back to the status
    pub fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("job ended with status '{}'", self.status))
    }
}

/// Job ids arrive as numbers or numeric strings depending on the endpoint
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(u64),
        Str(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Num(n) => Ok(n),
        Id::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// `results` is `null` or an empty array until a job finishes
fn de_results<'de, D: Deserializer<'de>>(deserializer: D) -> Result<JobResults, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_object() {
        serde_json::from_value(value).map_err(serde::de::Error::custom)
    } else {
        Ok(JobResults::default())
    }
}

// ============================================================================
// Files
// ============================================================================

/// File resource (`GET /v2/storage/files/{id}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Presigned download URL (the manifest for sliced files)
    pub url: String,
    #[serde(default)]
    pub is_sliced: bool,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// Manifest listing the slices of a sliced file
#[derive(Debug, Clone, Deserialize)]
pub struct SliceManifest {
    #[serde(default)]
    pub entries: Vec<SliceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SliceEntry {
    pub url: String,
}

// ============================================================================
// Imports + Events
// ============================================================================

/// Result of a synchronous table import
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    #[serde(default)]
    pub imported_columns: Vec<String>,
    #[serde(default)]
    pub total_rows_count: Option<u64>,
    #[serde(default)]
    pub warnings: Vec<serde_json::Value>,
}

/// Raw response to an event write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub status: u16,
    pub body: String,
}

impl EventResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
