//! Pre-authentication canned responders.
//!
//! A probe pairs a [`Matcher`] with a fixed response. The black-hole layer runs
//! after the kill-switch and before authentication, answering matching traffic
//! (scanners, `go-get` discovery, retired endpoints) without touching any
//! provider. First match wins, in configuration order.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::observability::metrics;
use crate::routing::matcher::{self, Matcher};

/// Fixed response of a probe.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub body: String,
    pub content_type: Option<HeaderValue>,
}

impl IntoResponse for CannedResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

#[derive(Debug)]
pub struct Probe {
    pub name: String,
    matcher: Box<dyn Matcher>,
    response: CannedResponse,
}

/// Ordered list of probes.
#[derive(Debug, Default)]
pub struct ProbeSet {
    probes: Vec<Probe>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[ProbeConfig]) -> Self {
        let mut set = Self::new();
        for config in configs {
            let Ok(status) = StatusCode::from_u16(config.status) else {
                warn!(probe = %config.name, status = config.status, "Skipping probe with invalid status");
                continue;
            };
            let content_type = config
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok());
            set.push(
                config.name.clone(),
                matcher::from_rule(&config.rule),
                CannedResponse {
                    status,
                    body: config.body.clone(),
                    content_type,
                },
            );
        }
        set
    }

    /// Append a probe with a custom predicate.
    pub fn push(&mut self, name: impl Into<String>, matcher: Box<dyn Matcher>, response: CannedResponse) {
        self.probes.push(Probe {
            name: name.into(),
            matcher,
            response,
        });
    }

    pub fn first_match(&self, request: &Request) -> Option<&Probe> {
        self.probes.iter().find(|probe| probe.matcher.matches(request))
    }
}

/// Answer probe traffic before it reaches authentication.
pub async fn black_hole(
    State(probes): State<Arc<ProbeSet>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(probe) = probes.first_match(&request) {
        debug!(probe = %probe.name, "Probe matched");
        metrics::record_probe_hit(&probe.name);
        return probe.response.clone().into_response();
    }
    next.run(request).await
}
