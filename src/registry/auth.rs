//! Authentication module for registry access
//!
//! Registries advertise their scheme on `GET /v2/` through a
//! `WWW-Authenticate` challenge. Basic challenges (ECR) take the credential
//! on every request; Bearer challenges (cgr.dev, Docker Hub, GHCR) exchange
//! the credential for a repository-scoped token at the challenge realm.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// What a caller can present to a registry
#[derive(Clone, PartialEq, Eq)]
pub enum RegistryCredential {
    Anonymous,
    Basic { username: String, password: String },
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryCredential::Anonymous => write!(f, "Anonymous"),
            RegistryCredential::Basic { username, .. } => {
                write!(f, "Basic {{ username: {:?}, password: <redacted> }}", username)
            }
        }
    }
}

/// Header material attached to registry requests
#[derive(Clone)]
pub enum Authorization {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Authorization {
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Authorization::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Authorization::Bearer(token) => request.bearer_auth(token),
        }
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Basic { username, .. } => write!(f, "Basic({})", username),
            Authorization::Bearer(token) => write!(f, "Bearer(<{} chars>)", token.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    Basic {
        realm: Option<String>,
    },
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Token scope for read access to a repository
pub fn pull_scope(repository: &str) -> String {
    format!("repository:{}:pull", repository)
}

/// Token scope for read/write access to a repository
pub fn push_scope(repository: &str) -> String {
    format!("repository:{}:pull,push", repository)
}

/// Parse a `WWW-Authenticate` header value
pub fn parse_challenge(header: &str) -> Option<AuthChallenge> {
    let header = header.trim();
    let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));
    let params = parse_params(params);
    let get = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    };

    if scheme.eq_ignore_ascii_case("basic") {
        Some(AuthChallenge::Basic { realm: get("realm") })
    } else if scheme.eq_ignore_ascii_case("bearer") {
        Some(AuthChallenge::Bearer {
            realm: get("realm")?,
            service: get("service"),
            scope: get("scope"),
        })
    } else {
        None
    }
}

/// Split `key="value",key2=value2` pairs, honoring commas inside quotes
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut in_quotes = false;

    let mut flush = |key: &mut String, value: &mut String| {
        let k = key.trim();
        if !k.is_empty() {
            params.push((k.to_string(), value.trim().to_string()));
        }
        key.clear();
        value.clear();
    };

    for c in input.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '=' if !in_value && !in_quotes => in_value = true,
            ',' if !in_quotes => {
                flush(&mut key, &mut value);
                in_value = false;
            }
            _ if in_value => value.push(c),
            _ => key.push(c),
        }
    }
    flush(&mut key, &mut value);
    params
}

#[derive(Debug, Clone)]
pub struct Auth {
    client: Client,
    registry_address: String,
    challenge: Arc<OnceCell<Option<AuthChallenge>>>,
    output: Logger,
}

impl Auth {
    pub fn new(client: Client, registry_address: &str, output: Logger) -> Self {
        Self {
            client,
            registry_address: registry_address.to_string(),
            challenge: Arc::new(OnceCell::new()),
            output,
        }
    }

    /// The registry's challenge, fetched once per client
    pub async fn challenge(&self) -> Result<Option<AuthChallenge>> {
        let challenge = self
            .challenge
            .get_or_try_init(|| self.fetch_challenge())
            .await?;
        Ok(challenge.clone())
    }

    async fn fetch_challenge(&self) -> Result<Option<AuthChallenge>> {
        let url = format!("{}/v2/", self.registry_address);
        self.output.detail(&format!("Probing registry auth: {}", url));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "auth challenge"))?;

        match response.status() {
            status if status.is_success() => Ok(None),
            StatusCode::UNAUTHORIZED => {
                let header = response
                    .headers()
                    .get(reqwest::header::WWW_AUTHENTICATE)
                    .and_then(|h| h.to_str().ok())
                    .ok_or_else(|| {
                        MirrorError::Auth(format!(
                            "{} returned 401 without a WWW-Authenticate challenge",
                            self.registry_address
                        ))
                    })?;
                self.output.detail(&format!("Auth challenge: {}", header));
                parse_challenge(header).map(Some).ok_or_else(|| {
                    MirrorError::Auth(format!("unsupported auth challenge: {}", header))
                })
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(HttpErrorHandler::handle_registry_error(status, &text, "auth challenge"))
            }
        }
    }

    /// Resolve the authorization for `scope`, or `None` for open registries
    pub async fn authorize(
        &self,
        credential: &RegistryCredential,
        scope: &str,
    ) -> Result<Option<Authorization>> {
        match self.challenge().await? {
            None => Ok(None),
            Some(AuthChallenge::Basic { .. }) => match credential {
                RegistryCredential::Basic { username, password } => Ok(Some(Authorization::Basic {
                    username: username.clone(),
                    password: password.clone(),
                })),
                RegistryCredential::Anonymous => Err(MirrorError::Auth(format!(
                    "{} requires basic credentials",
                    self.registry_address
                ))),
            },
            Some(AuthChallenge::Bearer { realm, service, .. }) => {
                let token = self
                    .fetch_token(&realm, service.as_deref(), scope, credential)
                    .await?;
                Ok(Some(Authorization::Bearer(token)))
            }
        }
    }

    async fn fetch_token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: &str,
        credential: &RegistryCredential,
    ) -> Result<String> {
        let mut query: Vec<(&str, &str)> = vec![("scope", scope)];
        if let Some(service) = service {
            query.push(("service", service));
        }

        self.output
            .detail(&format!("Requesting token from {} for {}", realm, scope));

        let mut request = self.client.get(realm).query(&query);
        if let RegistryCredential::Basic { username, password } = credential {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_auth_error(status, &text));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| MirrorError::Parse(format!("Failed to parse token response: {}", e)))?;

        token_response
            .token
            .or(token_response.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MirrorError::Auth("token response carried no token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_challenge_with_comma_in_scope() {
        let header = r#"Bearer realm="https://cgr.dev/token",service="cgr.dev",scope="repository:chainguard/nginx:pull,push""#;
        assert_eq!(
            parse_challenge(header),
            Some(AuthChallenge::Bearer {
                realm: "https://cgr.dev/token".to_string(),
                service: Some("cgr.dev".to_string()),
                scope: Some("repository:chainguard/nginx:pull,push".to_string()),
            })
        );
    }

    #[test]
    fn parses_basic_challenge() {
        let header = r#"Basic realm="https://123456789012.dkr.ecr.us-east-1.amazonaws.com/",service="ecr.amazonaws.com""#;
        assert_eq!(
            parse_challenge(header),
            Some(AuthChallenge::Basic {
                realm: Some("https://123456789012.dkr.ecr.us-east-1.amazonaws.com/".to_string())
            })
        );
    }

    #[test]
    fn bearer_without_realm_is_rejected() {
        assert_eq!(parse_challenge(r#"Bearer service="x""#), None);
        assert_eq!(parse_challenge("Negotiate abc"), None);
    }

    #[test]
    fn scopes_name_the_repository() {
        assert_eq!(pull_scope("chainguard/nginx"), "repository:chainguard/nginx:pull");
        assert_eq!(push_scope("mirror/nginx"), "repository:mirror/nginx:pull,push");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = RegistryCredential::Basic {
            username: "AWS".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", credential);
        assert!(rendered.contains("AWS"));
        assert!(!rendered.contains("hunter2"));
    }
}
