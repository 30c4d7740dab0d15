//! Storage API client
//!
//! Thin wrapper over [`HttpClient`]: every method is one Storage API call (or
//! a short chain of them) with the response reshaped into crate types.

use super::events::EventRequest;
use super::types::{
    BucketDescriptor, EventResponse, FileInfo, ImportResult, Job, RawBucket, RawTable,
    SliceManifest, TableDescriptor, TableDetail,
};
use crate::auth::{AuthConfig, RequestHeaders};
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::frame::TableFrame;
use crate::http::{HttpClient, MultipartField, RequestOptions};
use crate::types::WriteMode;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Operation name of table export jobs
pub const OPERATION_TABLE_EXPORT: &str = "tableExport";
/// Operation name of table import jobs
pub const OPERATION_TABLE_IMPORT: &str = "tableImport";

/// A table exported into the temporary data folder
#[derive(Debug, Clone)]
pub struct TableExport {
    pub table_id: String,
    /// `{tmp_data_folder}/{table id}.csv`
    pub path: PathBuf,
    /// Export job id
    pub job_id: u64,
    pub detail: TableDetail,
}

impl TableExport {
    /// Parse the exported CSV
    pub fn load_frame(&self) -> Result<TableFrame> {
        TableFrame::from_csv_path(&self.path)
    }
}

/// Storage API client
#[derive(Debug, Clone)]
pub struct StorageClient {
    http: HttpClient,
    config: StorageConfig,
}

impl StorageClient {
    /// Create a client for a validated connection config
    pub fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpClient::with_auth(
            config.http_client_config(),
            AuthConfig::storage_token(config.token.clone()),
        )?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn root_url(&self) -> &str {
        self.config.base_url()
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    // ========================================================================
    // Buckets + tables
    // ========================================================================

    /// `GET /v2/storage/buckets`
    pub async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>> {
        let raw: Vec<RawBucket> = self
            .call_json(Method::GET, "v2/storage/buckets", RequestOptions::new())
            .await?;
        debug!(count = raw.len(), "Listed buckets");
        Ok(raw.into_iter().map(BucketDescriptor::from).collect())
    }

    /// `GET /v2/storage/buckets/{bucket}/tables`
    pub async fn list_tables(&self, bucket_id: &str) -> Result<Vec<TableDescriptor>> {
        let raw: Vec<RawTable> = self
            .call_json(
                Method::GET,
                &format!("v2/storage/buckets/{bucket_id}/tables"),
                RequestOptions::new(),
            )
            .await?;
        debug!(bucket = bucket_id, count = raw.len(), "Listed tables");
        Ok(raw
            .into_iter()
            .map(|t| TableDescriptor::from_raw(t, bucket_id))
            .collect())
    }

    /// `GET /v2/storage/tables/{table}`
    pub async fn table_detail(&self, table_id: &str) -> Result<TableDetail> {
        let raw: RawTable = self
            .call_json(
                Method::GET,
                &format!("v2/storage/tables/{table_id}"),
                RequestOptions::new(),
            )
            .await?;
        Ok(raw.into())
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// `GET /v2/storage/jobs`, newest first
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.call_json(Method::GET, "v2/storage/jobs", RequestOptions::new())
            .await
    }

    /// `GET /v2/storage/jobs/{id}`
    pub async fn job(&self, job_id: u64) -> Result<Job> {
        self.call_json(
            Method::GET,
            &format!("v2/storage/jobs/{job_id}"),
            RequestOptions::new(),
        )
        .await
    }

    /// Most recent job of an operation on a table
    pub async fn find_job_id(&self, table_id: &str, operation: &str) -> Result<Option<u64>> {
        let jobs = self.list_jobs().await?;
        Ok(jobs
            .into_iter()
            .find(|job| {
                job.table_id.as_deref() == Some(table_id)
                    && job.operation_name.as_deref() == Some(operation)
            })
            .map(|job| job.id))
    }

    /// Poll a job until it finishes
    ///
    /// Returns the finished job on success; failed, cancelled and terminated
    /// jobs become [`Error::JobFailed`].
    pub async fn wait_for_job(&self, job: Job) -> Result<Job> {
        let poll_interval = self.config.jobs.poll_interval();
        let max_wait = self.config.jobs.max_wait();
        let started = Instant::now();
        let mut job = job;

        while !job.status.is_terminal() {
            if started.elapsed() >= max_wait {
                return Err(Error::JobTimeout {
                    job_id: job.id,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(poll_interval).await;
            job = self.job(job.id).await?;
            debug!(job_id = job.id, status = %job.status, "Polled job");
        }

        if job.status.is_success() {
            Ok(job)
        } else {
            Err(Error::JobFailed {
                job_id: job.id,
                message: job.failure_message(),
            })
        }
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// `POST /v2/storage/tables/{table}/export-async`
    pub async fn start_export(&self, table_id: &str) -> Result<Job> {
        let request = RequestOptions::new().form([("format", "rfc"), ("gzip", "0")]);
        self.call_json(
            Method::POST,
            &format!("v2/storage/tables/{table_id}/export-async"),
            request,
        )
        .await
    }

    /// `GET /v2/storage/files/{id}?federationToken=1`
    pub async fn file_info(&self, file_id: u64) -> Result<FileInfo> {
        self.call_json(
            Method::GET,
            &format!("v2/storage/files/{file_id}"),
            RequestOptions::new().query("federationToken", "1"),
        )
        .await
    }

    /// Download an exported file as CSV with a header row
    ///
    /// Sliced files have no header; `columns` supplies it.
    pub async fn download_file(&self, file: &FileInfo, columns: &[String]) -> Result<Bytes> {
        if !file.is_sliced {
            return self.download(&file.url).await;
        }

        let manifest: SliceManifest = serde_json::from_slice(&self.download(&file.url).await?)
            .map_err(|e| Error::decode(format!("Invalid slice manifest for file {}: {e}", file.id)))?;

        let mut csv = BytesMut::new();
        csv.put_slice(csv_header(columns).as_bytes());
        for entry in &manifest.entries {
            let slice = self.download(&entry.url).await?;
            csv.put_slice(&slice);
            if !slice.is_empty() && !slice.ends_with(b"\n") {
                csv.put_u8(b'\n');
            }
        }
        debug!(file_id = file.id, slices = manifest.entries.len(), "Merged sliced file");
        Ok(csv.freeze())
    }

    /// Export a table into `{tmp_data_folder}/{table id}.csv`
    pub async fn export_table_to_file(&self, table_id: &str) -> Result<TableExport> {
        let detail = self.table_detail(table_id).await?;

        let job = self.start_export(table_id).await?;
        let job = self.wait_for_job(job).await?;
        let file_id = job.file_id().ok_or_else(|| {
            Error::decode(format!("Export job {} finished without a file", job.id))
        })?;

        let file = self.file_info(file_id).await?;
        let csv = self.download_file(&file, &detail.columns).await?;

        let folder = &self.config.tmp_data_folder;
        tokio::fs::create_dir_all(folder).await?;
        let path = folder.join(export_file_name(table_id));
        tokio::fs::write(&path, &csv).await?;

        info!(
            table = table_id,
            job_id = job.id,
            path = %path.display(),
            "Exported table"
        );

        Ok(TableExport {
            table_id: table_id.to_string(),
            path,
            job_id: job.id,
            detail,
        })
    }

    /// Export a table and parse it into a frame
    pub async fn read_table(&self, table_id: &str) -> Result<(TableFrame, TableExport)> {
        let export = self.export_table_to_file(table_id).await?;
        let frame = export.load_frame()?;
        Ok((frame, export))
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// `POST /v2/storage/tables/{table}/import` with a CSV body
    pub async fn load_table(&self, table_id: &str, csv: Bytes, mode: WriteMode) -> Result<ImportResult> {
        let incremental = if mode.is_incremental() { "1" } else { "0" };
        let file_name = format!("{table_id}.csv");
        let request = RequestOptions::new().multipart(vec![
            MultipartField::file("data", file_name, "text/csv", csv),
            MultipartField::text("incremental", incremental),
        ]);

        let result: ImportResult = self
            .call_json(
                Method::POST,
                &format!("v2/storage/tables/{table_id}/import"),
                request,
            )
            .await?;
        info!(table = table_id, incremental = mode.is_incremental(), "Loaded table");
        Ok(result)
    }

    /// Serialize a frame to CSV and load it into a table
    pub async fn write_table(&self, table_id: &str, frame: &TableFrame, mode: WriteMode) -> Result<ImportResult> {
        let csv = frame.to_csv()?;
        self.load_table(table_id, Bytes::from(csv), mode).await
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// `POST /v2/storage/events`
    ///
    /// API errors are returned as a response rather than an error; only
    /// transport failures are errors.
    pub async fn create_event(&self, event: &EventRequest, headers: &RequestHeaders) -> Result<EventResponse> {
        let request = RequestOptions::new().json(event.payload(headers)).retries(0);
        match self.http.post_with("v2/storage/events", request).await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await?;
                Ok(EventResponse { status, body })
            }
            Err(Error::HttpStatus { status, body }) => Ok(EventResponse { status, body }),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        request: RequestOptions,
    ) -> Result<T> {
        self.http
            .request_json(method, path, request)
            .await
            .map_err(Error::into_api_error)
    }

    /// Presigned URLs carry their own credentials
    async fn download(&self, url: &str) -> Result<Bytes> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::decode(format!(
                "Cannot download '{url}': only HTTP(S) file URLs are supported"
            )));
        }
        self.http
            .get_bytes(url, RequestOptions::new().without_auth())
            .await
    }
}

/// RFC 4180 header row, every name quoted
/// Tables with the same name in different buckets must not share a file
pub(crate) fn export_file_name(table_id: &str) -> String {
    let stem: String = table_id
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    format!("{stem}.csv")
}

fn csv_header(columns: &[String]) -> String {
    let quoted: Vec<String> = columns
        .iter()
        .map(|c| format!("\"{}\"", c.replace('"', "\"\"")))
        .collect();
    format!("{}\n", quoted.join(","))
}
