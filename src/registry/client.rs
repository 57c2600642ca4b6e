// RegistryClient talks the OCI distribution API to one registry host.
// It owns the HTTP client and the token manager, and hands both to the
// per-area operation modules.

use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::registry::auth::{Auth, RegistryCredential};
use crate::registry::operations::{BlobOperations, ManifestOperations, RepositoryOperations};
use crate::registry::reference::registry_address;
use crate::registry::token_manager::TokenManager;
use crate::registry::transport::{BlobStream, ManifestResponse, RegistryTransport};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("chain-mirror/", env!("CARGO_PKG_VERSION"));

pub struct RegistryClientBuilder {
    host: String,
    credential: RegistryCredential,
    timeout: Duration,
    output: Logger,
}

impl RegistryClientBuilder {
    pub fn new(host: String) -> Self {
        Self {
            host,
            credential: RegistryCredential::Anonymous,
            timeout: Duration::from_secs(300),
            output: Logger::default(),
        }
    }

    pub fn with_credential(mut self, credential: RegistryCredential) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(self.timeout)
            .build()
            .map_err(|e| MirrorError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let address = registry_address(&self.host);
        let auth = Auth::new(client.clone(), &address, self.output.clone());
        let token_manager = TokenManager::new(auth, self.credential, self.output.clone());

        Ok(RegistryClient {
            manifests: ManifestOperations::new(
                client.clone(),
                address.clone(),
                self.output.clone(),
                token_manager.clone(),
            ),
            repositories: RepositoryOperations::new(
                client.clone(),
                address.clone(),
                self.output.clone(),
                token_manager.clone(),
            ),
            blobs: BlobOperations::new(client, address.clone(), self.output, token_manager),
            host: self.host,
            address,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    host: String,
    address: String,
    manifests: ManifestOperations,
    repositories: RepositoryOperations,
    blobs: BlobOperations,
}

impl RegistryClient {
    pub fn builder(host: impl Into<String>) -> RegistryClientBuilder {
        RegistryClientBuilder::new(host.into())
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl RegistryTransport for RegistryClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.repositories.list_tags(repository).await
    }

    async fn get_manifest(&self, repository: &str, reference: &str) -> Result<ManifestResponse> {
        self.manifests.pull_manifest(repository, reference).await
    }

    async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        data: Bytes,
    ) -> Result<()> {
        self.manifests
            .push_manifest(repository, reference, media_type, data)
            .await
    }

    async fn blob_exists(&self, repository: &str, digest: &str) -> Result<bool> {
        self.blobs.check_blob_exists(repository, digest).await
    }

    async fn get_blob(&self, repository: &str, digest: &str) -> Result<BlobStream> {
        self.blobs.pull_blob(repository, digest).await
    }

    async fn put_blob(&self, repository: &str, digest: &str, blob: BlobStream) -> Result<()> {
        self.blobs.push_blob(repository, digest, blob).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_https_client_for_public_hosts() {
        let client = RegistryClient::builder("cgr.dev").build().unwrap();
        assert_eq!(client.host(), "cgr.dev");
        assert_eq!(client.address(), "https://cgr.dev");
    }

    #[test]
    fn builds_http_client_for_loopback() {
        let client = RegistryClient::builder("localhost:5000")
            .with_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(client.address(), "http://localhost:5000");
    }
}
