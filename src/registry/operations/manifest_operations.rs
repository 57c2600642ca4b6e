//! Manifest operations for registry client
//!
//! Implements Docker Registry v2 and OCI manifest operations:
//! - Manifest download (GET /v2/{name}/manifests/{reference})
//! - Manifest upload (PUT /v2/{name}/manifests/{reference})
//! - Accept headers covering Docker v2, OCI image and both index formats

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{MirrorError, Result};
use crate::image::manifest::MANIFEST_ACCEPT;
use crate::logging::Logger;
use crate::registry::auth::{pull_scope, push_scope, Authorization};
use crate::registry::token_manager::TokenManager;
use crate::registry::transport::ManifestResponse;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;

pub const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";

#[derive(Debug, Clone)]
pub struct ManifestOperations {
    client: Client,
    address: String,
    output: Logger,
    token_manager: TokenManager,
}

impl ManifestOperations {
    pub fn new(client: Client, address: String, output: Logger, token_manager: TokenManager) -> Self {
        Self {
            client,
            address,
            output,
            token_manager,
        }
    }

    /// Download manifest with multi-format Accept headers
    pub async fn pull_manifest(&self, repository: &str, reference: &str) -> Result<ManifestResponse> {
        let client = self.client.clone();
        let url = format!("{}/v2/{}/manifests/{}", self.address, repository, reference);
        let output = self.output.clone();

        self.token_manager
            .execute_with_retry(&pull_scope(repository), move |authorization| {
                let client = client.clone();
                let url = url.clone();
                let output = output.clone();
                Box::pin(async move {
                    Self::pull_manifest_internal(&client, &url, &output, authorization).await
                })
            })
            .await
    }

    async fn pull_manifest_internal(
        client: &Client,
        url: &str,
        output: &Logger,
        authorization: Option<Authorization>,
    ) -> Result<ManifestResponse> {
        output.detail(&format!("GET {}", url));

        let mut request = client.get(url).header(ACCEPT, MANIFEST_ACCEPT);
        if let Some(authorization) = &authorization {
            request = authorization.apply(request);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "manifest pull"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text,
                "manifest pull",
            ));
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE.as_str());
        let digest = header(DOCKER_CONTENT_DIGEST);

        output.detail(&format!(
            "Manifest type: {}",
            content_type.as_deref().unwrap_or("unknown")
        ));

        let data = response.bytes().await.map_err(|e| {
            MirrorError::Network(format!("Failed to read manifest response: {}", e))
        })?;

        Ok(ManifestResponse {
            data,
            content_type,
            digest,
        })
    }

    /// Upload manifest bytes verbatim under `reference`
    pub async fn push_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        data: Bytes,
    ) -> Result<()> {
        let client = self.client.clone();
        let url = format!("{}/v2/{}/manifests/{}", self.address, repository, reference);
        let media_type = media_type.to_string();
        let output = self.output.clone();

        self.token_manager
            .execute_with_retry(&push_scope(repository), move |authorization| {
                let client = client.clone();
                let url = url.clone();
                let media_type = media_type.clone();
                let data = data.clone();
                let output = output.clone();
                Box::pin(async move {
                    Self::push_manifest_internal(&client, &url, &output, &media_type, data, authorization)
                        .await
                })
            })
            .await
    }

    async fn push_manifest_internal(
        client: &Client,
        url: &str,
        output: &Logger,
        media_type: &str,
        data: Bytes,
        authorization: Option<Authorization>,
    ) -> Result<()> {
        output.detail(&format!("PUT {} ({})", url, media_type));

        let mut request = client
            .put(url)
            .header(CONTENT_TYPE, media_type)
            .body(data);
        if let Some(authorization) = &authorization {
            request = authorization.apply(request);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "manifest upload"))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text,
                "manifest upload",
            ))
        }
    }
}
