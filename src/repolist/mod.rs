//! Repository list acquisition
//!
//! The list is recomputed on every invocation, so it must come out identical
//! for identical configuration: sources are consulted in a fixed order and
//! entries are normalized the same way regardless of where they came from.

pub mod ssm;

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::image::digest::DigestUtils;
use crate::logging::Logger;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

pub use ssm::SsmParameterStore;

const FALLBACK_REPOSITORIES: [&str; 3] = ["foo", "bar", "baz"];

/// Hex characters kept from the list hash
const FINGERPRINT_LEN: usize = 16;

#[async_trait]
pub trait RepositoryListProvider: Send + Sync {
    async fn resolve(&self) -> Result<Vec<String>>;
}

/// Remote key/value parameter lookup
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Decrypted value of `name`, `None` when the parameter carries no value
    async fn get_parameter(&self, name: &str) -> Result<Option<String>>;
}

/// Provider driven by [`MirrorConfig::repo_list`]
pub struct ConfiguredRepositoryList {
    config: Arc<MirrorConfig>,
    parameters: Option<Arc<dyn ParameterStore>>,
    output: Logger,
}

impl ConfiguredRepositoryList {
    pub fn new(config: Arc<MirrorConfig>, output: Logger) -> Self {
        Self {
            config,
            parameters: None,
            output,
        }
    }

    pub fn with_parameter_store(mut self, parameters: Arc<dyn ParameterStore>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    async fn from_parameter(&self, name: &str) -> Result<Vec<String>> {
        let store = self.parameters.as_ref().ok_or_else(|| {
            MirrorError::Configuration(format!(
                "REPO_LIST_SSM_PARAM={} set but no parameter store configured",
                name
            ))
        })?;

        let value = store
            .get_parameter(name)
            .await
            .map_err(|e| MirrorError::Discovery(format!("load from SSM {:?}: {}", name, e)))?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                MirrorError::Discovery(format!("load from SSM {:?}: empty SSM parameter", name))
            })?;

        Ok(parse_repo_text(&value))
    }

    fn fallback(&self) -> Vec<String> {
        FALLBACK_REPOSITORIES
            .iter()
            .map(|name| {
                format!(
                    "{}/{}/{}",
                    self.config.source_registry, self.config.group_name, name
                )
            })
            .collect()
    }
}

#[async_trait]
impl RepositoryListProvider for ConfiguredRepositoryList {
    async fn resolve(&self) -> Result<Vec<String>> {
        let sources = &self.config.repo_list;

        if let Some(raw) = sources.json.as_deref() {
            match serde_json::from_str::<Vec<String>>(raw) {
                Ok(list) => return Ok(normalize_repo_list(list)),
                Err(e) => self
                    .output
                    .warning(&format!("REPO_LIST_JSON invalid ({}); falling back", e)),
            }
        }

        if let Some(raw) = sources.csv.as_deref() {
            return Ok(normalize_repo_list(raw.split(',')));
        }

        if let Some(name) = sources.parameter_name.as_deref() {
            return self.from_parameter(name).await;
        }

        self.output
            .verbose("No repository list configured; using static fallback");
        Ok(self.fallback())
    }
}

/// Parse a JSON string array, or comma-delimited text when it is not JSON
pub fn parse_repo_text(value: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(value.trim()) {
        Ok(list) => normalize_repo_list(list),
        Err(_) => normalize_repo_list(value.split(',')),
    }
}

/// Trim entries, drop blanks, keep the first occurrence of duplicates
pub fn normalize_repo_list<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        let trimmed = entry.as_ref().trim();
        if !trimmed.is_empty() && seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Short stable identity of a resolved list
pub fn fingerprint(list: &[String]) -> String {
    let hash = DigestUtils::compute_sha256(list.join("\n").as_bytes());
    hash[..FINGERPRINT_LEN].to_string()
}
