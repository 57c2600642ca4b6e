//! Image transfer between two registries
//!
//! An image manifest is written only after every blob it references exists
//! at the destination. An index is written only after each of its children
//! has been written by digest. Manifest bytes are never re-serialized, so the
//! destination digest always matches the source.

use crate::error::{MirrorError, Result};
use crate::image::digest::DigestUtils;
use crate::image::manifest::{Descriptor, ImageDescriptor};
use crate::logging::Logger;
use crate::registry::transport::RegistryTransport;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Nested index depth accepted before the graph is treated as malformed
const MAX_INDEX_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub manifests_written: usize,
    pub blobs_copied: usize,
    pub blobs_present: usize,
    pub bytes_copied: u64,
}

impl TransferSummary {
    pub fn absorb(&mut self, other: &TransferSummary) {
        self.manifests_written += other.manifests_written;
        self.blobs_copied += other.blobs_copied;
        self.blobs_present += other.blobs_present;
        self.bytes_copied += other.bytes_copied;
    }
}

/// Source/destination repository pair plus a label for errors
struct Route<'a> {
    source_repo: &'a str,
    destination_repo: &'a str,
    label: &'a str,
}

#[derive(Default)]
struct TransferState {
    summary: TransferSummary,
    seen_blobs: HashSet<String>,
    written_manifests: HashSet<String>,
}

pub struct TransferExecutor {
    source: Arc<dyn RegistryTransport>,
    destination: Arc<dyn RegistryTransport>,
    output: Logger,
}

impl TransferExecutor {
    pub fn new(
        source: Arc<dyn RegistryTransport>,
        destination: Arc<dyn RegistryTransport>,
        output: Logger,
    ) -> Self {
        Self {
            source,
            destination,
            output,
        }
    }

    /// Write `descriptor` to `destination_repo:tag`, copying whatever it
    /// references first.
    pub async fn transfer(
        &self,
        source_repo: &str,
        destination_repo: &str,
        tag: &str,
        descriptor: &ImageDescriptor,
    ) -> Result<TransferSummary> {
        let label = format!("{}/{}:{}", self.source.host(), source_repo, tag);
        let route = Route {
            source_repo,
            destination_repo,
            label: &label,
        };
        let mut state = TransferState::default();

        self.copy_manifest(&route, tag, descriptor, &mut state, 0)
            .await
            .map_err(|e| into_transfer(&label, e))?;

        let summary = state.summary;
        self.output.success(&format!(
            "Mirrored {} -> {}:{} ({} manifest(s), {} blob(s) copied, {} present, {})",
            label,
            destination_repo,
            tag,
            summary.manifests_written,
            summary.blobs_copied,
            summary.blobs_present,
            self.output.format_size(summary.bytes_copied)
        ));
        Ok(summary)
    }

    fn copy_manifest<'a>(
        &'a self,
        route: &'a Route<'a>,
        reference: &'a str,
        descriptor: &'a ImageDescriptor,
        state: &'a mut TransferState,
        depth: usize,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if depth > MAX_INDEX_DEPTH {
                return Err(MirrorError::Parse(format!(
                    "index nesting deeper than {} levels",
                    MAX_INDEX_DEPTH
                )));
            }

            let document = descriptor.document()?;

            if descriptor.is_index() {
                self.output.verbose(&format!(
                    "Index {} has {} child manifest(s)",
                    DigestUtils::short(&descriptor.digest),
                    document.manifests.len()
                ));
                for child in &document.manifests {
                    if !state.written_manifests.insert(child.digest.clone()) {
                        continue;
                    }
                    let child_descriptor = self.fetch_child(route, child).await?;
                    self.copy_manifest(route, &child.digest, &child_descriptor, state, depth + 1)
                        .await?;
                }
            } else {
                for blob in document.blobs() {
                    self.copy_blob(route, blob, state).await?;
                }
            }

            self.destination
                .put_manifest(
                    route.destination_repo,
                    reference,
                    &descriptor.media_type,
                    descriptor.raw.clone(),
                )
                .await?;
            state.summary.manifests_written += 1;
            self.output.detail(&format!(
                "Wrote {} {}:{}",
                if descriptor.is_index() { "index" } else { "manifest" },
                route.destination_repo,
                reference
            ));
            Ok(())
        }
        .boxed()
    }

    async fn fetch_child(&self, route: &Route<'_>, child: &Descriptor) -> Result<ImageDescriptor> {
        let response = self
            .source
            .get_manifest(route.source_repo, &child.digest)
            .await?;
        let content_type = response
            .content_type
            .as_deref()
            .or(Some(child.media_type.as_str()).filter(|mt| !mt.is_empty()));
        ImageDescriptor::from_parts(response.data.clone(), content_type, Some(&child.digest))
    }

    async fn copy_blob(
        &self,
        route: &Route<'_>,
        blob: &Descriptor,
        state: &mut TransferState,
    ) -> Result<()> {
        if blob.is_non_distributable() {
            self.output.verbose(&format!(
                "Skipping non-distributable layer {}",
                DigestUtils::short(&blob.digest)
            ));
            return Ok(());
        }
        if !state.seen_blobs.insert(blob.digest.clone()) {
            return Ok(());
        }

        if self
            .destination
            .blob_exists(route.destination_repo, &blob.digest)
            .await?
        {
            state.summary.blobs_present += 1;
            self.output.verbose(&format!(
                "Blob {} already present",
                DigestUtils::short(&blob.digest)
            ));
            return Ok(());
        }

        let stream = self.source.get_blob(route.source_repo, &blob.digest).await?;
        let size = stream.size.unwrap_or(blob.size);
        self.output.step(&format!(
            "Copying blob {} ({}) for {}",
            DigestUtils::short(&blob.digest),
            self.output.format_size(size),
            route.label
        ));
        self.destination
            .put_blob(route.destination_repo, &blob.digest, stream)
            .await?;

        state.summary.blobs_copied += 1;
        state.summary.bytes_copied += size;
        Ok(())
    }
}

fn into_transfer(label: &str, err: MirrorError) -> MirrorError {
    match err {
        MirrorError::Transfer { .. } => err,
        other => MirrorError::transfer(label, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_accumulate() {
        let mut total = TransferSummary::default();
        total.absorb(&TransferSummary {
            manifests_written: 1,
            blobs_copied: 2,
            blobs_present: 3,
            bytes_copied: 40,
        });
        total.absorb(&TransferSummary {
            manifests_written: 2,
            blobs_copied: 0,
            blobs_present: 1,
            bytes_copied: 2,
        });
        assert_eq!(
            total,
            TransferSummary {
                manifests_written: 3,
                blobs_copied: 2,
                blobs_present: 4,
                bytes_copied: 42,
            }
        );
    }

    #[test]
    fn keeps_existing_transfer_errors() {
        let err = into_transfer("a:b", MirrorError::transfer("x:y", "boom"));
        assert!(matches!(err, MirrorError::Transfer { ref reference, .. } if reference == "x:y"));
        let err = into_transfer("a:b", MirrorError::Network("reset".into()));
        assert!(matches!(err, MirrorError::Transfer { ref reference, .. } if reference == "a:b"));
    }
}
