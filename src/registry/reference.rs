//! Repository identifiers such as `cgr.dev/chainguard/nginx`

use crate::error::{MirrorError, Result};
use std::fmt;

/// A repository split into registry host and path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub registry: String,
    pub path: String,
}

impl RepositoryRef {
    /// Parse an identifier, falling back to `default_registry` when the first
    /// segment does not look like a host (no `.` or `:` and not `localhost`).
    pub fn parse(identifier: &str, default_registry: &str) -> Result<Self> {
        let identifier = identifier.trim().trim_end_matches('/');
        if identifier.is_empty() || identifier.chars().any(char::is_whitespace) {
            return Err(MirrorError::Configuration(format!(
                "invalid repository identifier: {:?}",
                identifier
            )));
        }

        let (registry, path) = match identifier.split_once('/') {
            Some((first, rest)) if looks_like_host(first) => (first.to_string(), rest.to_string()),
            None if looks_like_host(identifier) => {
                return Err(MirrorError::Configuration(format!(
                    "repository identifier names only a registry host: {}",
                    identifier
                )));
            }
            _ => (default_registry.to_string(), identifier.to_string()),
        };

        let last_segment = path.rsplit('/').next().unwrap_or(&path);
        if path.is_empty() || last_segment.contains(':') || last_segment.contains('@') {
            return Err(MirrorError::Configuration(format!(
                "repository identifier must name a repository without tag or digest: {}",
                identifier
            )));
        }

        Ok(Self { registry, path })
    }

    /// `registry/path`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.registry, self.path)
    }

    /// `registry/path:tag`, used in log lines and error references
    pub fn tagged(&self, tag: &str) -> String {
        format!("{}/{}:{}", self.registry, self.path, tag)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.path)
    }
}

fn looks_like_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

/// Base URL for a registry host.
///
/// Explicit schemes are kept; loopback hosts default to plain HTTP.
pub fn registry_address(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        format!("http://{}", host)
    } else {
        format!("https://{}", host)
    }
}

/// Strip any scheme from an endpoint, leaving `host[:port]`
pub fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_path() {
        let repo = RepositoryRef::parse("cgr.dev/chainguard/nginx", "cgr.dev").unwrap();
        assert_eq!(repo.registry, "cgr.dev");
        assert_eq!(repo.path, "chainguard/nginx");
        assert_eq!(repo.tagged("latest"), "cgr.dev/chainguard/nginx:latest");
    }

    #[test]
    fn hostless_identifier_uses_default_registry() {
        let repo = RepositoryRef::parse("chainguard/nginx", "cgr.dev").unwrap();
        assert_eq!(repo.full_name(), "cgr.dev/chainguard/nginx");
    }

    #[test]
    fn ports_and_localhost_are_hosts() {
        let repo = RepositoryRef::parse("localhost:5000/team/app", "cgr.dev").unwrap();
        assert_eq!(repo.registry, "localhost:5000");
        assert_eq!(repo.path, "team/app");
    }

    #[test]
    fn rejects_tagged_identifiers() {
        assert!(RepositoryRef::parse("cgr.dev/chainguard/nginx:latest", "cgr.dev").is_err());
        assert!(RepositoryRef::parse("", "cgr.dev").is_err());
        assert!(RepositoryRef::parse("cgr.dev/", "cgr.dev").is_err());
    }

    #[test]
    fn builds_addresses() {
        assert_eq!(registry_address("cgr.dev"), "https://cgr.dev");
        assert_eq!(registry_address("localhost:5000"), "http://localhost:5000");
        assert_eq!(registry_address("http://mirror.internal/"), "http://mirror.internal");
        assert_eq!(
            strip_scheme("https://123.dkr.ecr.us-east-1.amazonaws.com"),
            "123.dkr.ecr.us-east-1.amazonaws.com"
        );
    }
}
