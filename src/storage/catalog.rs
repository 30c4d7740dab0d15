//! Listing seam used by the table picker

use super::client::StorageClient;
use super::types::{BucketDescriptor, TableDescriptor};
use crate::error::Result;
use async_trait::async_trait;

/// Source of the buckets and tables offered in the picker
#[async_trait]
pub trait StorageCatalog: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>>;

    async fn list_tables(&self, bucket_id: &str) -> Result<Vec<TableDescriptor>>;
}

#[async_trait]
impl StorageCatalog for StorageClient {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>> {
        StorageClient::list_buckets(self).await
    }

    async fn list_tables(&self, bucket_id: &str) -> Result<Vec<TableDescriptor>> {
        StorageClient::list_tables(self, bucket_id).await
    }
}
