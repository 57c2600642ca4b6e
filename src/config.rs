//! Configuration module
//!
//! All environment-derived settings are read exactly once into an immutable
//! [`MirrorConfig`], which is then shared (behind an `Arc`) with every
//! component that needs it.

use crate::error::{MirrorError, Result};
use std::collections::BTreeMap;
use std::env;
use std::fmt;

pub const DEFAULT_SOURCE_REGISTRY: &str = "cgr.dev";
pub const DEFAULT_GROUP_NAME: &str = "chainguard";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Static username/secret pair for the source registry
#[derive(Clone)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthConfig {
    /// Both halves present and non-blank
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.trim().is_empty() && !pass.trim().is_empty() => {
                Some((user, pass))
            }
            _ => None,
        }
    }
}

/// Where the repository list comes from, highest precedence first
#[derive(Debug, Clone, Default)]
pub struct RepoListConfig {
    pub json: Option<String>,
    pub csv: Option<String>,
    pub parameter_name: Option<String>,
}

/// Which tags of a repository get mirrored
#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    pub copy_all: bool,
    /// Per-repository explicit tags, keyed by full identifier or host-less path
    pub explicit: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub source_registry: String,
    pub group_name: String,
    pub destination_prefix: String,
    pub source_auth: AuthConfig,
    pub repo_list: RepoListConfig,
    pub tag_policy: TagPolicy,
    pub dry_run: bool,
    pub start_index: i64,
    pub function_name: Option<String>,
    pub http_timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source_registry: DEFAULT_SOURCE_REGISTRY.to_string(),
            group_name: DEFAULT_GROUP_NAME.to_string(),
            destination_prefix: String::new(),
            source_auth: AuthConfig {
                username: None,
                password: None,
            },
            repo_list: RepoListConfig::default(),
            tag_policy: TagPolicy::default(),
            dry_run: false,
            start_index: 0,
            function_name: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl MirrorConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |key: &str| get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let explicit = match get("TAG_MAP_JSON") {
            Some(raw) => serde_json::from_str::<BTreeMap<String, Vec<String>>>(&raw).map_err(
                |e| MirrorError::Configuration(format!("TAG_MAP_JSON is not a repo -> [tags] object: {}", e)),
            )?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            source_registry: get("SRC_REGISTRY")
                .unwrap_or_else(|| DEFAULT_SOURCE_REGISTRY.to_string()),
            group_name: get("GROUP_NAME").unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string()),
            destination_prefix: normalize_prefix(&get("DST_PREFIX").unwrap_or_default()),
            source_auth: AuthConfig {
                username: lookup("CGR_USERNAME"),
                password: lookup("CGR_PASSWORD"),
            },
            repo_list: RepoListConfig {
                json: get("REPO_LIST_JSON"),
                csv: get("REPO_LIST_CSV"),
                parameter_name: get("REPO_LIST_SSM_PARAM"),
            },
            tag_policy: TagPolicy {
                copy_all: flag("COPY_ALL_TAGS"),
                explicit,
            },
            dry_run: flag("MIRROR_DRY_RUN"),
            start_index: get("START_INDEX")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0),
            function_name: get("AWS_LAMBDA_FUNCTION_NAME"),
            http_timeout_secs: get("MIRROR_HTTP_TIMEOUT")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = self.dry_run || dry_run;
        self
    }

    pub fn with_copy_all_tags(mut self, copy_all: bool) -> Self {
        self.tag_policy.copy_all = self.tag_policy.copy_all || copy_all;
        self
    }
}

/// Trim spaces and surrounding slashes from a destination path prefix
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<MirrorConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MirrorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.source_registry, "cgr.dev");
        assert_eq!(config.group_name, "chainguard");
        assert!(!config.dry_run);
        assert!(!config.tag_policy.copy_all);
        assert_eq!(config.start_index, 0);
        assert_eq!(config.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
        assert!(config.source_auth.credentials().is_none());
    }

    #[test]
    fn reads_flags_case_insensitively() {
        let config = config_from(&[
            ("COPY_ALL_TAGS", "TRUE"),
            ("MIRROR_DRY_RUN", "True"),
            ("START_INDEX", "7"),
        ])
        .unwrap();
        assert!(config.tag_policy.copy_all);
        assert!(config.dry_run);
        assert_eq!(config.start_index, 7);
    }

    #[test]
    fn bad_start_index_falls_back_to_zero() {
        let config = config_from(&[("START_INDEX", "seven")]).unwrap();
        assert_eq!(config.start_index, 0);
    }

    #[test]
    fn prefix_is_trimmed_of_slashes() {
        let config = config_from(&[("DST_PREFIX", " /mirror/cgr/ ")]).unwrap();
        assert_eq!(config.destination_prefix, "mirror/cgr");
    }

    #[test]
    fn parses_tag_map() {
        let config = config_from(&[("TAG_MAP_JSON", r#"{"chainguard/nginx":["1.25","latest"]}"#)])
            .unwrap();
        assert_eq!(
            config.tag_policy.explicit.get("chainguard/nginx"),
            Some(&vec!["1.25".to_string(), "latest".to_string()])
        );
    }

    #[test]
    fn malformed_tag_map_is_configuration_error() {
        let err = config_from(&[("TAG_MAP_JSON", "[1,2]")]).unwrap_err();
        assert!(matches!(err, MirrorError::Configuration(_)));
    }

    #[test]
    fn blank_credentials_are_absent() {
        let config = config_from(&[("CGR_USERNAME", "robot"), ("CGR_PASSWORD", "  ")]).unwrap();
        assert!(config.source_auth.credentials().is_none());
    }

    #[test]
    fn debug_output_hides_source_password() {
        let config = config_from(&[("CGR_USERNAME", "robot"), ("CGR_PASSWORD", "s3cr3t-token")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("robot"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("s3cr3t-token"));
    }
}
