//! Storage API access
//!
//! [`StorageClient`] wraps the Storage API endpoints a data app needs:
//!
//! | Call | Endpoint |
//! |---|---|
//! | [`list_buckets`](StorageClient::list_buckets) | `GET /v2/storage/buckets` |
//! | [`list_tables`](StorageClient::list_tables) | `GET /v2/storage/buckets/{bucket}/tables` |
//! | [`table_detail`](StorageClient::table_detail) | `GET /v2/storage/tables/{table}` |
//! | [`read_table`](StorageClient::read_table) | export job, file lookup, download |
//! | [`write_table`](StorageClient::write_table) | `POST /v2/storage/tables/{table}/import` |
//! | [`list_jobs`](StorageClient::list_jobs) | `GET /v2/storage/jobs` |
//! | [`create_event`](StorageClient::create_event) | `POST /v2/storage/events` |

mod catalog;
mod client;
mod events;
mod types;

pub use catalog::StorageCatalog;
pub use client::{StorageClient, TableExport, OPERATION_TABLE_EXPORT, OPERATION_TABLE_IMPORT};
pub use events::{
    EventRequest, DEFAULT_EVENT_ENDPOINT, DEFAULT_EVENT_MESSAGE, EVENT_COMPONENT, EVENT_TYPE,
    UNKNOWN,
};
pub use types::{
    table_in_bucket, BucketDescriptor, EventResponse, FileInfo, ImportResult, Job, JobError,
    JobFileRef, JobResults, JobStatus, SliceEntry, SliceManifest, TableDescriptor, TableDetail,
};
