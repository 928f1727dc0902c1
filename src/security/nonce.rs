//! Single-purpose random tokens remembered by the server.
//!
//! A token is only honored if this process issued it and it has not expired.
//! Login `state` values and anti-forgery tokens both live here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::RngCore;

const TOKEN_BYTES: usize = 32;
const SWEEP_EVERY: usize = 100;

/// 32 random bytes, hex encoded.
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

struct Issued<V> {
    value: V,
    expires_at: Instant,
}

/// Issued tokens, each carrying a value and an expiry.
pub struct NonceStore<V> {
    issued: DashMap<String, Issued<V>>,
    ttl: Duration,
    inserts: AtomicUsize,
}

impl<V> NonceStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            issued: DashMap::new(),
            ttl,
            inserts: AtomicUsize::new(0),
        }
    }

    /// Remember `value` under a fresh token and return the token.
    pub fn issue(&self, value: V) -> String {
        let token = random_token();
        self.issued.insert(
            token.clone(),
            Issued {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
        if self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
        token
    }

    /// Whether `token` was issued here and is still live.
    pub fn contains(&self, token: &str) -> bool {
        self.issued
            .get(token)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Consume `token`. A token is accepted at most once.
    pub fn take(&self, token: &str) -> Option<V> {
        let (_, issued) = self.issued.remove(token)?;
        (issued.expires_at > Instant::now()).then_some(issued.value)
    }

    /// Drop expired tokens; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.issued.len();
        self.issued.retain(|_, issued| issued.expires_at > now);
        before.saturating_sub(self.issued.len())
    }
}
