//! Destination platform seams
//!
//! The destination registry's control plane (repository management, tag →
//! digest lookups) and its credential exchange live outside the registry
//! protocol. For ECR both are served by [`EcrRegistry`](crate::registry::ecr::EcrRegistry).

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    Existing,
    Created,
}

#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Create the repository (scan-on-push) unless it already exists
    async fn ensure_repository(&self, name: &str) -> Result<RepositoryStatus>;

    /// Digest currently recorded for `tag`, `None` when the tag is absent
    async fn tag_digest(&self, name: &str, tag: &str) -> Result<Option<String>>;
}

/// Raw output of the platform token exchange
#[derive(Debug, Clone)]
pub struct AuthorizationToken {
    /// base64 of `username:password`
    pub token: String,
    pub proxy_endpoint: Option<String>,
}

#[async_trait]
pub trait AuthorizationTokenSource: Send + Sync {
    async fn authorization_token(&self) -> Result<AuthorizationToken>;
}
