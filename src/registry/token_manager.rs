//! Scoped token cache with refresh-on-401
//!
//! Bearer tokens are minted per repository scope and expire after a few
//! minutes, so a long repository pass may outlive the first token. Each
//! operation runs through [`TokenManager::execute_with_retry`], which drops
//! the cached authorization and retries once when the registry answers 401.

use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::registry::auth::{Auth, Authorization, RegistryCredential};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct TokenManager {
    auth: Auth,
    credential: RegistryCredential,
    cache: Arc<RwLock<HashMap<String, Option<Authorization>>>>,
    output: Logger,
}

impl TokenManager {
    pub fn new(auth: Auth, credential: RegistryCredential, output: Logger) -> Self {
        Self {
            auth,
            credential,
            cache: Arc::new(RwLock::new(HashMap::new())),
            output,
        }
    }

    /// Cached authorization for `scope`, negotiating one on first use
    pub async fn authorization(&self, scope: &str) -> Result<Option<Authorization>> {
        {
            let guard = self.cache.read().map_err(|_| {
                MirrorError::Auth("Failed to acquire token read lock".to_string())
            })?;
            if let Some(cached) = guard.get(scope) {
                return Ok(cached.clone());
            }
        }

        let authorization = self.auth.authorize(&self.credential, scope).await?;

        let mut guard = self.cache.write().map_err(|_| {
            MirrorError::Auth("Failed to acquire token write lock".to_string())
        })?;
        guard.insert(scope.to_string(), authorization.clone());
        Ok(authorization)
    }

    /// Forget the authorization for `scope` so the next call renegotiates
    pub fn invalidate(&self, scope: &str) {
        if let Ok(mut guard) = self.cache.write() {
            guard.remove(scope);
        }
    }

    /// Execute operation with automatic token refresh on 401 errors
    pub async fn execute_with_retry<F, T>(&self, scope: &str, operation: F) -> Result<T>
    where
        F: Fn(Option<Authorization>) -> BoxFuture<'static, Result<T>>,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            let authorization = self.authorization(scope).await?;

            match operation(authorization).await {
                Err(err) if err.is_unauthorized() && attempt < MAX_ATTEMPTS => {
                    self.output.warning(&format!(
                        "Attempt {} for {} failed with 401, refreshing token...",
                        attempt, scope
                    ));
                    self.invalidate(scope);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
