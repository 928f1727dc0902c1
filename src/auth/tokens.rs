//! Access token storage contract.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::session::StoreError;

/// Resolves API access tokens to usernames.
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    async fn lookup(&self, token: &str) -> Result<Option<String>, StoreError>;
}

/// Process-local token store seeded from `[auth.access_tokens]`.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<String, String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(tokens: &HashMap<String, String>) -> Self {
        let store = Self::new();
        for (token, username) in tokens {
            store.insert(token.clone(), username.clone());
        }
        store
    }

    pub fn insert(&self, token: impl Into<String>, username: impl Into<String>) {
        self.tokens.insert(token.into(), username.into());
    }
}

#[async_trait]
impl AccessTokenStore for MemoryTokenStore {
    async fn lookup(&self, token: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_tokens_resolve() {
        let mut seed = HashMap::new();
        seed.insert("t0k3n".to_string(), "alice".to_string());
        let store = MemoryTokenStore::from_config(&seed);

        assert_eq!(store.lookup("t0k3n").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(store.lookup("other").await.unwrap(), None);
    }
}
