//! Blob operations for registry client
//!
//! - Existence checks (HEAD /v2/{name}/blobs/{digest})
//! - Streaming download (GET /v2/{name}/blobs/{digest})
//! - Monolithic upload (POST /v2/{name}/blobs/uploads/ then PUT ?digest=)

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{MirrorError, Result};
use crate::image::digest::DigestUtils;
use crate::logging::Logger;
use crate::registry::auth::{pull_scope, push_scope, Authorization};
use crate::registry::token_manager::TokenManager;
use crate::registry::transport::BlobStream;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, StatusCode};
use url::Url;

#[derive(Debug, Clone)]
pub struct BlobOperations {
    client: Client,
    address: String,
    output: Logger,
    token_manager: TokenManager,
}

impl BlobOperations {
    pub fn new(client: Client, address: String, output: Logger, token_manager: TokenManager) -> Self {
        Self {
            client,
            address,
            output,
            token_manager,
        }
    }

    /// Check blob existence; uses the push scope since it precedes uploads
    pub async fn check_blob_exists(&self, repository: &str, digest: &str) -> Result<bool> {
        let client = self.client.clone();
        let url = format!("{}/v2/{}/blobs/{}", self.address, repository, digest);
        let output = self.output.clone();
        let short = DigestUtils::short(digest).to_string();

        self.token_manager
            .execute_with_retry(&push_scope(repository), move |authorization| {
                let client = client.clone();
                let url = url.clone();
                let output = output.clone();
                let short = short.clone();
                Box::pin(async move {
                    let mut request = client.head(&url);
                    if let Some(authorization) = &authorization {
                        request = authorization.apply(request);
                    }

                    let response = request.send().await.map_err(|e| {
                        NetworkErrorHandler::handle_network_error(&e, "blob existence check")
                    })?;

                    match response.status() {
                        status if status.is_success() => {
                            output.detail(&format!("Blob {} exists in registry", short));
                            Ok(true)
                        }
                        StatusCode::NOT_FOUND => {
                            output.detail(&format!("Blob {} does not exist in registry", short));
                            Ok(false)
                        }
                        StatusCode::UNAUTHORIZED => Err(MirrorError::Unauthorized(format!(
                            "blob check for {} - token may have expired",
                            short
                        ))),
                        status => {
                            // Unknown answers fall through to an upload
                            output.warning(&format!(
                                "Unexpected status {} when checking blob existence for {}",
                                status, short
                            ));
                            Ok(false)
                        }
                    }
                })
            })
            .await
    }

    /// Open a blob for streaming download
    pub async fn pull_blob(&self, repository: &str, digest: &str) -> Result<BlobStream> {
        let client = self.client.clone();
        let url = format!("{}/v2/{}/blobs/{}", self.address, repository, digest);

        self.token_manager
            .execute_with_retry(&pull_scope(repository), move |authorization| {
                let client = client.clone();
                let url = url.clone();
                Box::pin(async move {
                    let mut request = client.get(&url);
                    if let Some(authorization) = &authorization {
                        request = authorization.apply(request);
                    }

                    let response = request
                        .send()
                        .await
                        .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob pull"))?;

                    let status = response.status();
                    if !status.is_success() {
                        let error_text = response.text().await.unwrap_or_default();
                        return Err(HttpErrorHandler::handle_registry_error(
                            status,
                            &error_text,
                            "blob pull",
                        ));
                    }

                    let size = response.content_length();
                    let stream = response
                        .bytes_stream()
                        .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob stream"));

                    Ok(BlobStream {
                        size,
                        stream: Box::pin(stream),
                    })
                })
            })
            .await
    }

    /// Upload a blob monolithically.
    ///
    /// Only the session start is retried; the streamed PUT body cannot be
    /// replayed, so it reuses whatever authorization the POST settled on.
    pub async fn push_blob(&self, repository: &str, digest: &str, blob: BlobStream) -> Result<()> {
        let scope = push_scope(repository);
        let location = self.start_upload(repository, &scope).await?;

        let mut url = Url::parse(&location)?;
        url.query_pairs_mut().append_pair("digest", digest);

        self.output.detail(&format!(
            "Uploading blob {} to {}",
            DigestUtils::short(digest),
            repository
        ));

        let mut request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream");
        if let Some(size) = blob.size {
            request = request.header(CONTENT_LENGTH, size);
        }
        if let Some(authorization) = self.token_manager.authorization(&scope).await? {
            request = authorization.apply(request);
        }

        let response = request
            .body(Body::wrap_stream(blob.stream))
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob upload"))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(HttpErrorHandler::handle_upload_error(status, &error_text, "blob upload"))
        }
    }

    async fn start_upload(&self, repository: &str, scope: &str) -> Result<String> {
        let client = self.client.clone();
        let address = self.address.clone();
        let url = format!("{}/v2/{}/blobs/uploads/", self.address, repository);

        self.token_manager
            .execute_with_retry(scope, move |authorization| {
                let client = client.clone();
                let address = address.clone();
                let url = url.clone();
                Box::pin(async move {
                    let mut request = client.post(&url).header(CONTENT_LENGTH, 0);
                    if let Some(authorization) = &authorization {
                        request = authorization.apply(request);
                    }

                    let response = request.send().await.map_err(|e| {
                        NetworkErrorHandler::handle_network_error(&e, "blob upload start")
                    })?;

                    let status = response.status();
                    if !status.is_success() {
                        let error_text = response.text().await.unwrap_or_default();
                        return Err(HttpErrorHandler::handle_upload_error(
                            status,
                            &error_text,
                            "blob upload start",
                        ));
                    }

                    let location = response
                        .headers()
                        .get(LOCATION)
                        .and_then(|h| h.to_str().ok())
                        .ok_or_else(|| {
                            MirrorError::Registry(
                                "No Location header in upload response".to_string(),
                            )
                        })?;

                    Ok(resolve_location(&address, location)?)
                })
            })
            .await
    }
}

/// Absolute upload URL from a possibly relative `Location` header
pub fn resolve_location(address: &str, location: &str) -> Result<String> {
    let base = Url::parse(address)?;
    Ok(base.join(location)?.to_string())
}
