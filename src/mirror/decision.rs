//! Digest-based skip decisions
//!
//! The destination registry is the only record of mirror state: a tag is
//! considered mirrored exactly when its recorded digest equals the source's
//! current digest.

use crate::error::{MirrorError, Result};
use crate::image::digest::DigestUtils;
use crate::image::manifest::ImageDescriptor;
use crate::logging::Logger;
use crate::registry::catalog::DestinationCatalog;
use crate::registry::reference::RepositoryRef;
use crate::registry::transport::RegistryTransport;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    Missing,
    DigestMismatch { existing: String },
    LookupFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorDecision {
    Skip { digest: String },
    Transfer { reason: TransferReason },
}

impl MirrorDecision {
    pub fn is_skip(&self) -> bool {
        matches!(self, MirrorDecision::Skip { .. })
    }
}

/// Outcome of the destination tag lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationDigest {
    Present(String),
    Absent,
    LookupFailed,
}

/// Skip iff the destination holds the identical normalized digest
pub fn decide(source_digest: &str, destination: &DestinationDigest) -> MirrorDecision {
    let source = DigestUtils::normalize(source_digest);
    match destination {
        DestinationDigest::Present(existing) => {
            let existing = DigestUtils::normalize(existing);
            if !source.is_empty() && existing == source {
                MirrorDecision::Skip { digest: source }
            } else {
                MirrorDecision::Transfer {
                    reason: TransferReason::DigestMismatch { existing },
                }
            }
        }
        DestinationDigest::Absent => MirrorDecision::Transfer {
            reason: TransferReason::Missing,
        },
        DestinationDigest::LookupFailed => MirrorDecision::Transfer {
            reason: TransferReason::LookupFailed,
        },
    }
}

/// What the engine learned about one tag
#[derive(Debug, Clone)]
pub struct TagEvaluation {
    pub source: ImageDescriptor,
    pub decision: MirrorDecision,
}

pub struct DigestSkipEngine {
    catalog: Arc<dyn DestinationCatalog>,
    output: Logger,
}

impl DigestSkipEngine {
    pub fn new(catalog: Arc<dyn DestinationCatalog>, output: Logger) -> Self {
        Self { catalog, output }
    }

    /// Fetch the source descriptor of `repository:tag`
    pub async fn source_descriptor(
        &self,
        source: &dyn RegistryTransport,
        repository: &RepositoryRef,
        tag: &str,
    ) -> Result<ImageDescriptor> {
        let reference = repository.tagged(tag);
        let response = source
            .get_manifest(&repository.path, tag)
            .await
            .map_err(|e| MirrorError::source_read(reference.clone(), e))?;

        ImageDescriptor::from_parts(
            response.data,
            response.content_type.as_deref(),
            response.digest.as_deref(),
        )
        .map_err(|e| MirrorError::source_read(reference, e))
    }

    /// Current destination digest; lookup failures degrade to a miss
    pub async fn destination_digest(&self, destination_repo: &str, tag: &str) -> DestinationDigest {
        match self.catalog.tag_digest(destination_repo, tag).await {
            Ok(Some(digest)) => DestinationDigest::Present(digest),
            Ok(None) => DestinationDigest::Absent,
            Err(err) => {
                self.output.warning(&format!("{} (treating as missing)", err));
                DestinationDigest::LookupFailed
            }
        }
    }

    pub async fn evaluate(
        &self,
        source: &dyn RegistryTransport,
        repository: &RepositoryRef,
        destination_repo: &str,
        tag: &str,
    ) -> Result<TagEvaluation> {
        let descriptor = self.source_descriptor(source, repository, tag).await?;
        let existing = self.destination_digest(destination_repo, tag).await;
        let decision = decide(&descriptor.digest, &existing);

        match &decision {
            MirrorDecision::Skip { digest } => self.output.info(&format!(
                "Skip {}:{} (digest {} already present)",
                destination_repo,
                tag,
                DigestUtils::short(digest)
            )),
            MirrorDecision::Transfer { reason } => self.output.verbose(&format!(
                "Transfer {} -> {}:{} ({:?})",
                repository.tagged(tag),
                destination_repo,
                tag,
                reason
            )),
        }

        Ok(TagEvaluation {
            source: descriptor,
            decision,
        })
    }
}
