//! Versioned runtime snapshot of the live-reloadable settings.
//!
//! Readers never lock: each request loads the current `Arc<RuntimeSnapshot>`
//! once, at the outermost layer, and every guard of that request consults the
//! same snapshot. Reloads publish a new snapshot; published snapshots are never
//! mutated.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    extract::{Request, State},
    http::Extensions,
    middleware::Next,
    response::Response,
};

use crate::config::SecurityConfig;
use crate::security::trust::TrustEvaluator;

/// Immutable view of the settings in force for one request.
#[derive(Debug)]
pub struct RuntimeSnapshot {
    pub version: u64,
    pub security: SecurityConfig,
    pub trust: TrustEvaluator,
}

impl RuntimeSnapshot {
    fn build(version: u64, security: SecurityConfig) -> Self {
        let trust = TrustEvaluator::from_config(&security);
        Self {
            version,
            security,
            trust,
        }
    }
}

/// Shared handle to the current snapshot.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<RuntimeSnapshot>>,
}

impl ConfigHandle {
    pub fn new(security: SecurityConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(RuntimeSnapshot::build(1, security))),
        }
    }

    /// The latest published snapshot.
    pub fn load(&self) -> Arc<RuntimeSnapshot> {
        self.current.load_full()
    }

    /// The snapshot attached to a request, or the latest one if none is attached.
    pub fn for_request(&self, extensions: &Extensions) -> Arc<RuntimeSnapshot> {
        extensions
            .get::<Arc<RuntimeSnapshot>>()
            .cloned()
            .unwrap_or_else(|| self.load())
    }

    /// Publish new settings and return the new version.
    pub fn publish(&self, security: SecurityConfig) -> u64 {
        let previous = self
            .current
            .rcu(|old| Arc::new(RuntimeSnapshot::build(old.version + 1, security.clone())));
        let version = previous.version + 1;
        tracing::info!(version, "Published security configuration");
        version
    }
}

/// Attach the current snapshot to the request extensions.
pub async fn attach_snapshot(
    State(handle): State<ConfigHandle>,
    mut request: Request,
    next: Next,
) -> Response {
    let snapshot = handle.load();
    request.extensions_mut().insert(snapshot);
    next.run(request).await
}
