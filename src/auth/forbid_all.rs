//! ForbidAll kill-switch.
//!
//! Two placements of the same check: [`forbid_all_requests`] is the outermost
//! layer of each listener and pre-empts everything including tracing and
//! pre-flight handling; [`ForbidAllProvider`] leads each auth chain. Both read
//! the flag from the request's runtime snapshot.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AuthProvider, Decision, Inbound};
use crate::config::ConfigHandle;
use crate::http::rejection::Rejection;

pub struct ForbidAllProvider {
    config: ConfigHandle,
}

impl ForbidAllProvider {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AuthProvider for ForbidAllProvider {
    fn name(&self) -> &'static str {
        "forbid_all"
    }

    async fn try_handle(&self, request: Inbound) -> Decision {
        if self.config.for_request(request.extensions()).security.forbid_all {
            Decision::Reject(Rejection::Forbidden)
        } else {
            Decision::PassThrough(request)
        }
    }
}

/// Reject every request while the kill-switch is active.
pub async fn forbid_all_requests(
    State(config): State<ConfigHandle>,
    request: Request,
    next: Next,
) -> Response {
    if config.for_request(request.extensions()).security.forbid_all {
        return Rejection::Forbidden.into_response();
    }
    next.run(request).await
}
