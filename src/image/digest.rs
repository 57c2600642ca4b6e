//! SHA256 digest utilities
//!
//! Manifest digests are the identity used for skip decisions, so every digest
//! that enters a comparison goes through [`DigestUtils::normalize`] first.

use sha2::Digest;

/// Utilities for working with content digests
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 hex digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute full digest (with sha256: prefix) from byte data
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("sha256:{}", Self::compute_sha256(data))
    }

    /// Validate SHA256 hex string (64 characters, all hex)
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Validate `algorithm:hex` digest format
    pub fn is_valid_digest(digest: &str) -> bool {
        match digest.split_once(':') {
            Some((algorithm, encoded)) => {
                !algorithm.is_empty()
                    && !encoded.is_empty()
                    && algorithm
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c))
                    && encoded.chars().all(|c| c.is_ascii_alphanumeric() || "=_-".contains(c))
            }
            None => false,
        }
    }

    /// Normalize a digest for comparison: trim whitespace, prefix bare hex.
    pub fn normalize(digest: &str) -> String {
        let trimmed = digest.trim();
        if Self::is_valid_sha256_hex(trimmed) {
            format!("sha256:{}", trimmed)
        } else {
            trimmed.to_string()
        }
    }

    /// Short form for log lines
    pub fn short(digest: &str) -> &str {
        let end = digest
            .char_indices()
            .nth(19)
            .map(|(i, _)| i)
            .unwrap_or(digest.len());
        &digest[..end]
    }
}
