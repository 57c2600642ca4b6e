//! Per-registry credential resolution
//!
//! The source registry takes a static username/secret pair from
//! configuration. The destination exchanges platform identity for a
//! short-lived registry password (fixed username, rotating password) and
//! learns its registry endpoint from the same call.

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::registry::auth::RegistryCredential;
use crate::registry::catalog::AuthorizationTokenSource;
use crate::registry::reference::strip_scheme;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

/// A registry host together with the credential to present there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegistry {
    pub host: String,
    pub credential: RegistryCredential,
}

pub struct CredentialResolver {
    config: Arc<MirrorConfig>,
    tokens: Arc<dyn AuthorizationTokenSource>,
    output: Logger,
}

impl CredentialResolver {
    pub fn new(
        config: Arc<MirrorConfig>,
        tokens: Arc<dyn AuthorizationTokenSource>,
        output: Logger,
    ) -> Self {
        Self {
            config,
            tokens,
            output,
        }
    }

    /// Static source credentials for `host`
    pub fn source(&self, host: &str) -> Result<ResolvedRegistry> {
        let (username, password) = self.config.source_auth.credentials().ok_or_else(|| {
            MirrorError::Configuration("CGR_USERNAME/CGR_PASSWORD not set".to_string())
        })?;

        Ok(ResolvedRegistry {
            host: host.to_string(),
            credential: RegistryCredential::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
        })
    }

    /// Exchange platform identity for destination registry credentials
    pub async fn destination(&self) -> Result<ResolvedRegistry> {
        let token = self.tokens.authorization_token().await?;
        let (username, password) = decode_authorization_token(&token.token)?;

        let endpoint = token.proxy_endpoint.as_deref().ok_or_else(|| {
            MirrorError::Configuration("ECR authorization data carried no endpoint".to_string())
        })?;
        let host = strip_scheme(endpoint).to_string();

        self.output
            .verbose(&format!("Destination registry endpoint: {}", host));

        Ok(ResolvedRegistry {
            host,
            credential: RegistryCredential::Basic { username, password },
        })
    }

    /// Authenticator for an arbitrary host.
    ///
    /// The configured source host resolves without network access. Any other
    /// host triggers the destination exchange; when it is not the destination
    /// endpoint either, the source credentials are used.
    pub async fn resolve(&self, host: &str) -> Result<ResolvedRegistry> {
        if host == self.config.source_registry {
            return self.source(host);
        }
        let destination = self.destination().await?;
        if destination.host == host {
            Ok(destination)
        } else {
            self.source(host)
        }
    }
}

/// Split a base64 `username:password` token
pub fn decode_authorization_token(token: &str) -> Result<(String, String)> {
    let decoded = STANDARD
        .decode(token.trim())
        .map_err(|e| MirrorError::Configuration(format!("decode ecr token: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| MirrorError::Configuration(format!("decode ecr token: {}", e)))?;

    match decoded.split_once(':') {
        Some((username, password)) if !username.is_empty() && !password.is_empty() => {
            Ok((username.to_string(), password.to_string()))
        }
        _ => Err(MirrorError::Configuration(
            "unexpected ecr token format".to_string(),
        )),
    }
}
