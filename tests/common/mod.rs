//! In-memory registries and AWS stand-ins for driving whole sweeps

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chain_mirror::chain::{ChainScheduler, LocalRelay};
use chain_mirror::config::{AuthConfig, MirrorConfig};
use chain_mirror::error::{MirrorError, Result};
use chain_mirror::image::DigestUtils;
use chain_mirror::image::manifest::{OCI_INDEX, OCI_MANIFEST};
use chain_mirror::logging::Logger;
use chain_mirror::mirror::{CredentialResolver, MirrorOrchestrator, RegistryConnector, ResolvedRegistry};
use chain_mirror::registry::{
    AuthorizationToken, AuthorizationTokenSource, BlobStream, DestinationCatalog, ManifestResponse,
    RegistryCredential, RegistryTransport, RepositoryStatus,
};
use chain_mirror::repolist::RepositoryListProvider;
use futures::TryStreamExt;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SOURCE_HOST: &str = "cgr.dev";
pub const DESTINATION_HOST: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";

pub const FOREIGN_LAYER: &str = "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";

/// Ordered record of every side effect across all fakes
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

#[derive(Default)]
struct Store {
    manifests: HashMap<(String, String), (String, Bytes)>,
    blobs: HashMap<(String, String), Bytes>,
    tags: HashMap<String, Vec<String>>,
}

pub struct FakeRegistry {
    host: String,
    store: Mutex<Store>,
    journal: Journal,
}

impl FakeRegistry {
    pub fn new(host: &str, journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            host: host.to_string(),
            store: Mutex::new(Store::default()),
            journal,
        })
    }

    pub fn add_blob(&self, repo: &str, data: &[u8]) -> String {
        let digest = DigestUtils::compute_docker_digest(data);
        self.store
            .lock()
            .unwrap()
            .blobs
            .insert((repo.to_string(), digest.clone()), Bytes::copy_from_slice(data));
        digest
    }

    /// Store a manifest under its digest and, when given, a tag
    pub fn add_manifest(&self, repo: &str, tag: Option<&str>, media_type: &str, raw: Bytes) -> String {
        let digest = DigestUtils::compute_docker_digest(&raw);
        let mut store = self.store.lock().unwrap();
        store.manifests.insert(
            (repo.to_string(), digest.clone()),
            (media_type.to_string(), raw.clone()),
        );
        if let Some(tag) = tag {
            store
                .manifests
                .insert((repo.to_string(), tag.to_string()), (media_type.to_string(), raw));
            let tags = store.tags.entry(repo.to_string()).or_default();
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        digest
    }

    /// Seed a single-platform image; returns the manifest digest
    pub fn seed_image(&self, repo: &str, tag: Option<&str>, layers: &[&[u8]]) -> String {
        let config = format!("{{\"architecture\":\"amd64\",\"repo\":\"{}\"}}", repo);
        let config_digest = self.add_blob(repo, config.as_bytes());
        let layers: Vec<_> = layers
            .iter()
            .map(|data| {
                json!({
                    "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip",
                    "digest": self.add_blob(repo, data),
                    "size": data.len(),
                })
            })
            .collect();
        let manifest = json!({
            "schemaVersion": 2,
            "mediaType": OCI_MANIFEST,
            "config": {
                "mediaType": "application/vnd.oci.image.config.v1+json",
                "digest": config_digest,
                "size": config.len(),
            },
            "layers": layers,
        });
        self.add_manifest(repo, tag, OCI_MANIFEST, Bytes::from(manifest.to_string()))
    }

    /// Seed a multi-platform index over two child images
    pub fn seed_index(&self, repo: &str, tag: &str) -> (String, Vec<String>) {
        let amd64 = self.seed_image(repo, None, &[b"amd64-layer", b"shared-layer"]);
        let arm64 = self.seed_image(repo, None, &[b"arm64-layer", b"shared-layer"]);
        let index = json!({
            "schemaVersion": 2,
            "mediaType": OCI_INDEX,
            "manifests": [
                {"mediaType": OCI_MANIFEST, "digest": amd64, "size": 1, "platform": {"os": "linux", "architecture": "amd64"}},
                {"mediaType": OCI_MANIFEST, "digest": arm64, "size": 1, "platform": {"os": "linux", "architecture": "arm64"}},
            ],
        });
        let digest = self.add_manifest(repo, Some(tag), OCI_INDEX, Bytes::from(index.to_string()));
        (digest, vec![amd64, arm64])
    }

    pub fn manifest(&self, repo: &str, reference: &str) -> Option<(String, Bytes)> {
        self.store
            .lock()
            .unwrap()
            .manifests
            .get(&(repo.to_string(), reference.to_string()))
            .cloned()
    }

    pub fn has_blob(&self, repo: &str, digest: &str) -> bool {
        self.store
            .lock()
            .unwrap()
            .blobs
            .contains_key(&(repo.to_string(), digest.to_string()))
    }
}

#[async_trait]
impl RegistryTransport for FakeRegistry {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.store
            .lock()
            .unwrap()
            .tags
            .get(repository)
            .cloned()
            .ok_or_else(|| MirrorError::NotFound(format!("repository {}", repository)))
    }

    async fn get_manifest(&self, repository: &str, reference: &str) -> Result<ManifestResponse> {
        let (media_type, data) = self
            .manifest(repository, reference)
            .ok_or_else(|| MirrorError::NotFound(format!("manifest {}:{}", repository, reference)))?;
        Ok(ManifestResponse {
            digest: Some(DigestUtils::compute_docker_digest(&data)),
            content_type: Some(media_type),
            data,
        })
    }

    async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        data: Bytes,
    ) -> Result<()> {
        self.journal
            .push(format!("put_manifest:{}:{}", repository, reference));
        let tag = (!reference.starts_with("sha256:")).then_some(reference);
        self.add_manifest(repository, tag, media_type, data);
        Ok(())
    }

    async fn blob_exists(&self, repository: &str, digest: &str) -> Result<bool> {
        Ok(self.has_blob(repository, digest))
    }

    async fn get_blob(&self, repository: &str, digest: &str) -> Result<BlobStream> {
        let data = self
            .store
            .lock()
            .unwrap()
            .blobs
            .get(&(repository.to_string(), digest.to_string()))
            .cloned()
            .ok_or_else(|| MirrorError::NotFound(format!("blob {}", digest)))?;
        Ok(BlobStream::from_bytes(data))
    }

    async fn put_blob(&self, repository: &str, digest: &str, blob: BlobStream) -> Result<()> {
        let chunks: Vec<Bytes> = blob.stream.try_collect().await?;
        let data = chunks.concat();
        if DigestUtils::compute_docker_digest(&data) != digest {
            return Err(MirrorError::Registry(format!("DIGEST_INVALID {}", digest)));
        }
        self.journal.push(format!("put_blob:{}:{}", repository, digest));
        self.add_blob(repository, &data);
        Ok(())
    }
}

/// ECR control plane over the destination fake
pub struct FakeCatalog {
    destination: Arc<FakeRegistry>,
    repositories: Mutex<HashSet<String>>,
    journal: Journal,
    pub fail_lookups: AtomicBool,
    pub token_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(destination: Arc<FakeRegistry>, journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            destination,
            repositories: Mutex::new(HashSet::new()),
            journal,
            fail_lookups: AtomicBool::new(false),
            token_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DestinationCatalog for FakeCatalog {
    async fn ensure_repository(&self, name: &str) -> Result<RepositoryStatus> {
        if self.repositories.lock().unwrap().insert(name.to_string()) {
            self.journal.push(format!("create_repository:{}", name));
            Ok(RepositoryStatus::Created)
        } else {
            Ok(RepositoryStatus::Existing)
        }
    }

    async fn tag_digest(&self, name: &str, tag: &str) -> Result<Option<String>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(MirrorError::destination_lookup(
                format!("{}:{}", name, tag),
                "ThrottlingException",
            ));
        }
        Ok(self
            .destination
            .manifest(name, tag)
            .map(|(_, raw)| DigestUtils::compute_docker_digest(&raw)))
    }
}

#[async_trait]
impl AuthorizationTokenSource for FakeCatalog {
    async fn authorization_token(&self) -> Result<AuthorizationToken> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AuthorizationToken {
            token: STANDARD.encode("AWS:rotating-password"),
            proxy_endpoint: Some(format!("https://{}", DESTINATION_HOST)),
        })
    }
}

/// Hands out the fakes by host and records the credentials presented
pub struct FakeConnector {
    source: Arc<FakeRegistry>,
    destination: Arc<FakeRegistry>,
    pub credentials: Mutex<Vec<(String, RegistryCredential)>>,
}

#[async_trait]
impl RegistryConnector for FakeConnector {
    async fn connect(&self, registry: &ResolvedRegistry) -> Result<Arc<dyn RegistryTransport>> {
        self.credentials
            .lock()
            .unwrap()
            .push((registry.host.clone(), registry.credential.clone()));
        match registry.host.as_str() {
            SOURCE_HOST => Ok(self.source.clone()),
            DESTINATION_HOST => Ok(self.destination.clone()),
            other => Err(MirrorError::Configuration(format!("unknown host {}", other))),
        }
    }
}

/// Repository list that can change between invocations
pub struct MutableList {
    repos: Mutex<Vec<String>>,
    pub resolves: AtomicUsize,
}

impl MutableList {
    pub fn set(&self, repos: &[&str]) {
        *self.repos.lock().unwrap() = repos.iter().map(|r| r.to_string()).collect();
    }
}

#[async_trait]
impl RepositoryListProvider for MutableList {
    async fn resolve(&self) -> Result<Vec<String>> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(self.repos.lock().unwrap().clone())
    }
}

pub struct Harness {
    pub journal: Journal,
    pub source: Arc<FakeRegistry>,
    pub destination: Arc<FakeRegistry>,
    pub catalog: Arc<FakeCatalog>,
    pub connector: Arc<FakeConnector>,
    pub list: Arc<MutableList>,
    pub relay: Arc<LocalRelay>,
    pub scheduler: ChainScheduler,
}

pub fn test_config() -> MirrorConfig {
    MirrorConfig {
        source_auth: AuthConfig {
            username: Some("robot".to_string()),
            password: Some("secret".to_string()),
        },
        ..MirrorConfig::default()
    }
}

pub fn harness(repos: &[&str]) -> Harness {
    harness_with(repos, test_config())
}

pub fn harness_with(repos: &[&str], config: MirrorConfig) -> Harness {
    let journal = Journal::default();
    let source = FakeRegistry::new(SOURCE_HOST, journal.clone());
    let destination = FakeRegistry::new(DESTINATION_HOST, journal.clone());
    let catalog = FakeCatalog::new(destination.clone(), journal.clone());
    let connector = Arc::new(FakeConnector {
        source: source.clone(),
        destination: destination.clone(),
        credentials: Mutex::new(Vec::new()),
    });
    let list = Arc::new(MutableList {
        repos: Mutex::new(repos.iter().map(|r| r.to_string()).collect()),
        resolves: AtomicUsize::new(0),
    });
    let relay = Arc::new(LocalRelay::new());

    let config = Arc::new(config);
    let output = Logger::new_quiet();
    let credentials = CredentialResolver::new(config.clone(), catalog.clone(), output.clone());
    let orchestrator = MirrorOrchestrator::new(
        config.clone(),
        credentials,
        connector.clone(),
        catalog.clone(),
        output.clone(),
    );
    let scheduler = ChainScheduler::new(
        list.clone(),
        Arc::new(orchestrator),
        relay.clone(),
        config.start_index,
        output,
    );

    Harness {
        journal,
        source,
        destination,
        catalog,
        connector,
        list,
        relay,
        scheduler,
    }
}
