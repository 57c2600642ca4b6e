//! Full mirror pass over one repository
//!
//! Resolves both registries, makes sure the destination repository exists,
//! then walks the selected tags in order. The first fatal per-tag error ends
//! the pass.

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::image::manifest::ManifestKind;
use crate::logging::Logger;
use crate::mirror::credentials::{CredentialResolver, ResolvedRegistry};
use crate::mirror::decision::{DigestSkipEngine, MirrorDecision, TransferReason};
use crate::mirror::tags::TagSelector;
use crate::mirror::transfer::{TransferExecutor, TransferSummary};
use crate::registry::catalog::{DestinationCatalog, RepositoryStatus};
use crate::registry::client::RegistryClient;
use crate::registry::reference::RepositoryRef;
use crate::registry::transport::RegistryTransport;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opens a registry transport for a resolved host
#[async_trait]
pub trait RegistryConnector: Send + Sync {
    async fn connect(&self, registry: &ResolvedRegistry) -> Result<Arc<dyn RegistryTransport>>;
}

/// Connector backed by [`RegistryClient`]
pub struct HttpConnector {
    timeout: Duration,
    output: Logger,
}

impl HttpConnector {
    pub fn new(timeout: Duration, output: Logger) -> Self {
        Self { timeout, output }
    }
}

#[async_trait]
impl RegistryConnector for HttpConnector {
    async fn connect(&self, registry: &ResolvedRegistry) -> Result<Arc<dyn RegistryTransport>> {
        let client = RegistryClient::builder(registry.host.clone())
            .with_credential(registry.credential.clone())
            .with_timeout(self.timeout)
            .with_output(self.output.clone())
            .build()?;
        Ok(Arc::new(client))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagAction {
    Skipped,
    Transferred,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagReport {
    pub tag: String,
    pub digest: String,
    pub kind: ManifestKind,
    pub action: TagAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TransferReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<TransferSummary>,
}

/// Result of one repository pass
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryReport {
    pub source: String,
    pub destination: String,
    pub dry_run: bool,
    pub repository_created: bool,
    pub tags: Vec<TagReport>,
    pub totals: TransferSummary,
    pub elapsed_ms: u128,
}

impl RepositoryReport {
    fn new(source: String, destination: String) -> Self {
        Self {
            source,
            destination,
            dry_run: false,
            repository_created: false,
            tags: Vec::new(),
            totals: TransferSummary::default(),
            elapsed_ms: 0,
        }
    }

    pub fn skipped(&self) -> usize {
        self.tags
            .iter()
            .filter(|t| t.action == TagAction::Skipped)
            .count()
    }

    pub fn transferred(&self) -> usize {
        self.tags.len() - self.skipped()
    }
}

/// The unit of work the chain scheduler delegates
#[async_trait]
pub trait RepositoryMirror: Send + Sync {
    async fn mirror(&self, repository: &str) -> Result<RepositoryReport>;
}

pub struct MirrorOrchestrator {
    config: Arc<MirrorConfig>,
    credentials: CredentialResolver,
    connector: Arc<dyn RegistryConnector>,
    catalog: Arc<dyn DestinationCatalog>,
    tags: TagSelector,
    output: Logger,
}

impl MirrorOrchestrator {
    pub fn new(
        config: Arc<MirrorConfig>,
        credentials: CredentialResolver,
        connector: Arc<dyn RegistryConnector>,
        catalog: Arc<dyn DestinationCatalog>,
        output: Logger,
    ) -> Self {
        let tags = TagSelector::new(config.clone(), output.clone());
        Self {
            config,
            credentials,
            connector,
            catalog,
            tags,
            output,
        }
    }

    pub fn destination_repository(&self, repository: &RepositoryRef) -> String {
        destination_path(
            &self.config.source_registry,
            &self.config.destination_prefix,
            repository,
        )
    }

    async fn run(&self, repository: &RepositoryRef, destination_repo: String) -> Result<RepositoryReport> {
        let started = Instant::now();
        let mut report = RepositoryReport::new(repository.full_name(), destination_repo);

        let source_registry = self.credentials.resolve(&repository.registry).await?;
        let destination_registry = self.credentials.destination().await?;
        let source = self.connector.connect(&source_registry).await?;
        let destination = self.connector.connect(&destination_registry).await?;

        let status = self.catalog.ensure_repository(&report.destination).await?;
        report.repository_created = status == RepositoryStatus::Created;

        let tags = self.tags.select(source.as_ref(), repository).await?;
        if tags.is_empty() {
            self.output
                .info(&format!("No tags to mirror for {}", repository));
        }

        let engine = DigestSkipEngine::new(self.catalog.clone(), self.output.clone());
        let executor = TransferExecutor::new(source.clone(), destination, self.output.clone());

        for tag in &tags {
            let evaluation = engine
                .evaluate(source.as_ref(), repository, &report.destination, tag)
                .await?;

            let mut entry = TagReport {
                tag: tag.clone(),
                digest: evaluation.source.digest.clone(),
                kind: evaluation.source.kind,
                action: TagAction::Skipped,
                reason: None,
                summary: None,
            };

            if let MirrorDecision::Transfer { reason } = evaluation.decision {
                let summary = executor
                    .transfer(&repository.path, &report.destination, tag, &evaluation.source)
                    .await?;
                report.totals.absorb(&summary);
                entry.action = TagAction::Transferred;
                entry.reason = Some(reason);
                entry.summary = Some(summary);
            }

            report.tags.push(entry);
        }

        report.elapsed_ms = started.elapsed().as_millis();
        self.output.summary(
            &format!("{} -> {}", report.source, report.destination),
            &[
                format!("Tags considered: {}", report.tags.len()),
                format!("Skipped: {}", report.skipped()),
                format!("Transferred: {}", report.transferred()),
                format!("Bytes copied: {}", self.output.format_size(report.totals.bytes_copied)),
                format!(
                    "Elapsed: {}",
                    self.output.format_duration(started.elapsed())
                ),
            ],
        );
        Ok(report)
    }
}

#[async_trait]
impl RepositoryMirror for MirrorOrchestrator {
    async fn mirror(&self, identifier: &str) -> Result<RepositoryReport> {
        let repository = RepositoryRef::parse(identifier, &self.config.source_registry)?;
        let destination_repo = self.destination_repository(&repository);

        if self.config.dry_run {
            self.output.info(&format!(
                "[DRY-RUN] Would mirror: {} -> {}",
                repository, destination_repo
            ));
            let mut report = RepositoryReport::new(repository.full_name(), destination_repo);
            report.dry_run = true;
            return Ok(report);
        }

        self.output.section(&format!("Mirroring {}", repository));
        let result = self.run(&repository, destination_repo).await;
        if let Err(err) = &result {
            self.output
                .error(&format!("Mirror of {} failed: {}", repository, err));
        }
        result
    }
}

/// Destination repository name for `repository`.
///
/// The configured source host is stripped; repositories on any other host
/// keep it as their first path segment. A non-empty prefix is joined in front.
pub fn destination_path(source_registry: &str, prefix: &str, repository: &RepositoryRef) -> String {
    let relative = if repository.registry == source_registry {
        repository.path.clone()
    } else {
        repository.full_name()
    };

    let prefix = prefix.trim().trim_matches('/').trim();
    if prefix.is_empty() {
        relative
    } else {
        format!("{}/{}", prefix, relative)
    }
}
