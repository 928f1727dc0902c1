//! Session storage contract and the session cookie.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use super::Identity;

/// Failure of a session or token collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A server-side session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub identity: Identity,
    pub expires_at: Instant,
}

impl Session {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Lookup and creation of sessions keyed by the session cookie value.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A live session for `id`; expired sessions are reported as absent.
    async fn lookup(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Start a session for a freshly established identity.
    async fn create(&self, identity: Identity) -> Result<Session, StoreError>;

    async fn revoke(&self, id: &str) -> Result<(), StoreError>;

    /// Drop expired sessions; returns how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Process-local session store.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn lookup(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let now = Instant::now();
        let session = self.sessions.get(id).map(|entry| entry.value().clone());
        match session {
            Some(session) if session.is_expired(now) => {
                self.sessions.remove(id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn create(&self, identity: Identity) -> Result<Session, StoreError> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            identity,
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn revoke(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.remove(id);
        Ok(())
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }
}

/// Value of cookie `name` from the `Cookie` headers, if present and non-empty.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Attributes shared by the cookies the front door sets.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookieSettings {
    pub fn new(name: impl Into<String>, secure: bool, max_age_secs: u64) -> Self {
        Self {
            name: name.into(),
            secure,
            max_age_secs,
        }
    }

    pub fn set(&self, value: &str) -> Option<HeaderValue> {
        self.render(value, self.max_age_secs)
    }

    pub fn clear(&self) -> Option<HeaderValue> {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> Option<HeaderValue> {
        let secure = if self.secure { "; Secure" } else { "" };
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.name, value, max_age, secure
        ))
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;

    #[test]
    fn reads_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; frontdoor_session=abc; other=1"),
        );
        assert_eq!(read_cookie(&headers, "frontdoor_session"), Some("abc"));
        assert_eq!(read_cookie(&headers, "missing"), None);
        assert_eq!(read_cookie(&headers, "frontdoor"), None);
    }

    #[test]
    fn empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("frontdoor_session="));
        assert_eq!(read_cookie(&headers, "frontdoor_session"), None);
    }

    #[test]
    fn cookie_attributes() {
        let cookie = CookieSettings::new("sid", true, 60).set("abc").unwrap();
        assert_eq!(cookie, "sid=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=60; Secure");

        let cleared = CookieSettings::new("sid", false, 60).clear().unwrap();
        assert_eq!(cleared, "sid=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    }

    #[tokio::test]
    async fn sessions_expire() {
        let store = MemorySessionStore::new(Duration::from_millis(20));
        let session = store
            .create(Identity::new("alice", AuthMethod::Session))
            .await
            .unwrap();
        assert!(store.lookup(&session.id).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.lookup(&session.id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn revoke_and_purge() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let session = store
            .create(Identity::new("bob", AuthMethod::Session))
            .await
            .unwrap();
        store.revoke(&session.id).await.unwrap();
        assert!(store.lookup(&session.id).await.unwrap().is_none());
        assert_eq!(store.purge_expired(), 0);
    }
}
