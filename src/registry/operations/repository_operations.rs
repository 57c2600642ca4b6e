//! Repository operations for registry client
//!
//! Tag listing (GET /v2/{name}/tags/list) with `Link` header pagination.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::registry::auth::{pull_scope, Authorization};
use crate::registry::token_manager::TokenManager;
use reqwest::header::LINK;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

const PAGE_SIZE: usize = 1000;
const MAX_PAGES: usize = 1000;

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct RepositoryOperations {
    client: Client,
    address: String,
    output: Logger,
    token_manager: TokenManager,
}

impl RepositoryOperations {
    pub fn new(client: Client, address: String, output: Logger, token_manager: TokenManager) -> Self {
        Self {
            client,
            address,
            output,
            token_manager,
        }
    }

    /// List all tags in repository, following `rel="next"` links
    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.output
            .verbose(&format!("Listing tags for repository: {}", repository));

        let base = Url::parse(&self.address)?;
        let mut next = Some(format!(
            "{}/v2/{}/tags/list?n={}",
            self.address, repository, PAGE_SIZE
        ));
        let mut tags = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(MirrorError::Registry(format!(
                    "tag listing for {} exceeded {} pages",
                    repository, MAX_PAGES
                )));
            }

            let client = self.client.clone();
            let output = self.output.clone();
            let (page, link) = self
                .token_manager
                .execute_with_retry(&pull_scope(repository), move |authorization| {
                    let client = client.clone();
                    let url = url.clone();
                    let output = output.clone();
                    Box::pin(async move {
                        Self::list_tags_page(&client, &url, &output, authorization).await
                    })
                })
                .await?;

            tags.extend(page);
            next = link
                .as_deref()
                .and_then(next_link)
                .map(|target| base.join(&target).map(String::from))
                .transpose()?;
        }

        self.output.verbose(&format!(
            "Found {} tags for repository {}",
            tags.len(),
            repository
        ));

        Ok(tags)
    }

    async fn list_tags_page(
        client: &Client,
        url: &str,
        output: &Logger,
        authorization: Option<Authorization>,
    ) -> Result<(Vec<String>, Option<String>)> {
        output.detail(&format!("GET {}", url));

        let mut request = client.get(url);
        if let Some(authorization) = &authorization {
            request = authorization.apply(request);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "tag listing"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text,
                "tag listing",
            ));
        }

        let link = response
            .headers()
            .get(LINK)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| {
            MirrorError::Network(format!("Failed to read tags response: {}", e))
        })?;
        let list: TagList = serde_json::from_str(&body).map_err(|e| {
            MirrorError::Registry(format!("Failed to parse tags response: {}", e))
        })?;

        Ok((list.tags.unwrap_or_default(), link))
    }
}

/// Extract the `rel="next"` target from an RFC 5988 `Link` header
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=\"next\"" || param == "rel=next"
        });
        if is_next && target.starts_with('<') && target.ends_with('>') {
            Some(target[1..target.len() - 1].to_string())
        } else {
            None
        }
    })
}
