//! Tag selection for one repository

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::registry::reference::RepositoryRef;
use crate::registry::transport::RegistryTransport;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_TAG: &str = "latest";

pub struct TagSelector {
    config: Arc<MirrorConfig>,
    output: Logger,
}

impl TagSelector {
    pub fn new(config: Arc<MirrorConfig>, output: Logger) -> Self {
        Self { config, output }
    }

    /// Explicitly configured tags for `repository`, if any
    pub fn explicit_tags(&self, repository: &RepositoryRef) -> Option<&[String]> {
        let explicit = &self.config.tag_policy.explicit;
        explicit
            .get(&repository.full_name())
            .or_else(|| explicit.get(&repository.path))
            .map(Vec::as_slice)
    }

    /// Tags to mirror for `repository`, normalized
    pub async fn select(
        &self,
        source: &dyn RegistryTransport,
        repository: &RepositoryRef,
    ) -> Result<Vec<String>> {
        if let Some(tags) = self.explicit_tags(repository) {
            let tags = normalize_tags(tags.iter().map(String::as_str));
            self.output.verbose(&format!(
                "Using {} explicit tag(s) for {}",
                tags.len(),
                repository
            ));
            return Ok(tags);
        }

        if self.config.tag_policy.copy_all {
            let listed = source.list_tags(&repository.path).await.map_err(|e| {
                MirrorError::Discovery(format!("list tags for {}: {}", repository, e))
            })?;
            let tags = normalize_tags(listed.iter().map(String::as_str));
            if tags.is_empty() {
                self.output
                    .warning(&format!("No tags found in {}", repository));
            } else {
                self.output
                    .detail(&format!("Found {} tag(s) in {}", tags.len(), repository));
            }
            return Ok(tags);
        }

        Ok(vec![DEFAULT_TAG.to_string()])
    }
}

/// Trim, drop blanks and remove duplicates, keeping first-seen order
pub fn normalize_tags<'a, I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagPolicy;
    use crate::registry::transport::{BlobStream, ManifestResponse};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::BTreeMap;

    struct ListingOnly(Result<Vec<String>>);

    #[async_trait]
    impl RegistryTransport for ListingOnly {
        fn host(&self) -> &str {
            "cgr.dev"
        }

        async fn list_tags(&self, _repository: &str) -> Result<Vec<String>> {
            match &self.0 {
                Ok(tags) => Ok(tags.clone()),
                Err(e) => Err(MirrorError::Registry(e.to_string())),
            }
        }

        async fn get_manifest(&self, _: &str, _: &str) -> Result<ManifestResponse> {
            unreachable!()
        }

        async fn put_manifest(&self, _: &str, _: &str, _: &str, _: Bytes) -> Result<()> {
            unreachable!()
        }

        async fn blob_exists(&self, _: &str, _: &str) -> Result<bool> {
            unreachable!()
        }

        async fn get_blob(&self, _: &str, _: &str) -> Result<BlobStream> {
            unreachable!()
        }

        async fn put_blob(&self, _: &str, _: &str, _: BlobStream) -> Result<()> {
            unreachable!()
        }
    }

    fn selector(copy_all: bool, explicit: &[(&str, &[&str])]) -> TagSelector {
        let explicit: BTreeMap<String, Vec<String>> = explicit
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|t| t.to_string()).collect()))
            .collect();
        let config = MirrorConfig {
            tag_policy: TagPolicy { copy_all, explicit },
            ..MirrorConfig::default()
        };
        TagSelector::new(Arc::new(config), Logger::new_quiet())
    }

    fn nginx() -> RepositoryRef {
        RepositoryRef::parse("cgr.dev/chainguard/nginx", "cgr.dev").unwrap()
    }

    #[tokio::test]
    async fn defaults_to_latest() {
        let source = ListingOnly(Ok(vec!["1.0".into()]));
        let tags = selector(false, &[]).select(&source, &nginx()).await.unwrap();
        assert_eq!(tags, vec!["latest"]);
    }

    #[tokio::test]
    async fn explicit_tags_override_copy_all() {
        let source = ListingOnly(Ok(vec!["1.0".into(), "2.0".into()]));
        let selector = selector(true, &[("chainguard/nginx", &[" 1.25 ", "", "1.25", "latest"])]);
        let tags = selector.select(&source, &nginx()).await.unwrap();
        assert_eq!(tags, vec!["1.25", "latest"]);
    }

    #[tokio::test]
    async fn explicit_tags_match_full_identifier() {
        let source = ListingOnly(Ok(vec![]));
        let selector = selector(false, &[("cgr.dev/chainguard/nginx", &["stable"])]);
        let tags = selector.select(&source, &nginx()).await.unwrap();
        assert_eq!(tags, vec!["stable"]);
    }

    #[tokio::test]
    async fn copy_all_lists_and_dedupes() {
        let source = ListingOnly(Ok(vec!["b".into(), "a".into(), "b".into()]));
        let tags = selector(true, &[]).select(&source, &nginx()).await.unwrap();
        assert_eq!(tags, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn empty_listing_is_valid() {
        let source = ListingOnly(Ok(vec![]));
        let tags = selector(true, &[]).select(&source, &nginx()).await.unwrap();
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_is_discovery_error() {
        let source = ListingOnly(Err(MirrorError::Registry("503".into())));
        let err = selector(true, &[]).select(&source, &nginx()).await.unwrap_err();
        assert!(matches!(err, MirrorError::Discovery(_)));
    }
}
