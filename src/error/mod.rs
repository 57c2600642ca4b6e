//! Error types for mirroring, discovery and chaining
//!
//! Fatal categories (configuration, discovery, source reads, transfers,
//! destination management, dispatch) stop the current invocation without
//! scheduling a continuation. Transport-level variants are produced by the
//! registry client and wrapped by whichever component owns the failure.

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// Missing or malformed credentials and identifiers
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Repository list or tag list could not be resolved
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The source manifest for a tag could not be read
    #[error("Source read error for {reference}: {message}")]
    SourceRead { reference: String, message: String },

    /// Copying blobs or writing manifests to the destination failed
    #[error("Transfer error for {reference}: {message}")]
    Transfer { reference: String, message: String },

    /// Querying the destination digest failed (non-fatal, treated as a miss)
    #[error("Destination lookup error for {reference}: {message}")]
    DestinationLookup { reference: String, message: String },

    /// Describing or creating the destination repository failed
    #[error("Destination error: {0}")]
    Destination(String),

    /// Scheduling the next invocation failed
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// The Lambda runtime loop itself failed
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP 401 from a registry, retried once with a fresh token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl MirrorError {
    pub fn source_read(reference: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MirrorError::SourceRead {
            reference: reference.into(),
            message: err.to_string(),
        }
    }

    pub fn transfer(reference: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MirrorError::Transfer {
            reference: reference.into(),
            message: err.to_string(),
        }
    }

    pub fn destination_lookup(reference: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MirrorError::DestinationLookup {
            reference: reference.into(),
            message: err.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, MirrorError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "registry request")
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for MirrorError {
    fn from(err: url::ParseError) -> Self {
        MirrorError::Parse(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_reference() {
        let err = MirrorError::source_read("cgr.dev/chainguard/foo:latest", "HTTP 500");
        assert_eq!(
            err.to_string(),
            "Source read error for cgr.dev/chainguard/foo:latest: HTTP 500"
        );
    }
}
