//! Registry transport interface
//!
//! The subset of the OCI distribution / Docker Registry v2 API the mirror
//! needs. [`RegistryClient`](crate::registry::RegistryClient) implements it
//! over HTTP; tests implement it in memory.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

/// Manifest payload as served by a registry
#[derive(Debug, Clone)]
pub struct ManifestResponse {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub digest: Option<String>,
}

/// A blob body streamed between registries without buffering it whole
pub struct BlobStream {
    pub size: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

impl BlobStream {
    pub fn from_bytes(data: Bytes) -> Self {
        Self {
            size: Some(data.len() as u64),
            stream: stream::once(async move { Ok(data) }).boxed(),
        }
    }
}

impl std::fmt::Debug for BlobStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStream").field("size", &self.size).finish()
    }
}

#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Registry host this transport talks to
    fn host(&self) -> &str;

    /// List repository tags, following pagination
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;

    /// Get manifest or index by tag or digest
    async fn get_manifest(&self, repository: &str, reference: &str) -> Result<ManifestResponse>;

    /// Put manifest or index under a tag or digest
    async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        data: Bytes,
    ) -> Result<()>;

    /// Check if blob exists in registry
    async fn blob_exists(&self, repository: &str, digest: &str) -> Result<bool>;

    /// Open a blob for streaming download
    async fn get_blob(&self, repository: &str, digest: &str) -> Result<BlobStream>;

    /// Upload a blob in a single monolithic request
    async fn put_blob(&self, repository: &str, digest: &str, blob: BlobStream) -> Result<()>;
}
