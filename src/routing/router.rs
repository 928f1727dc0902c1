//! Request classification and guard stack assembly.
//!
//! # Responsibilities
//! - Classify every path into exactly one destination
//! - Wrap each surface's handlers in its guard stack, in a fixed order
//! - Wrap the whole external listener in the pre-authentication layers
//!
//! # Design Decisions
//! - Stacks are assembled once at startup, immutable at runtime
//! - `ServiceBuilder` order is outermost-first; that order is part of the
//!   security contract and is asserted by tests
//! - The internal prefix is never served by the external listener
//! - Explicit 404 rather than falling through to another surface

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    Router,
};
use tower::{ServiceBuilder, ServiceExt};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::chain::enforce;
use crate::auth::forbid_all::forbid_all_requests;
use crate::auth::override_auth::{override_auth, OverrideAuth};
use crate::auth::AuthProviderChain;
use crate::config::snapshot::attach_snapshot;
use crate::config::ConfigHandle;
use crate::http::handlers::Surfaces;
use crate::observability::metrics::track_requests;
use crate::observability::tracing::RequestSpan;
use crate::routing::probes::{black_hole, ProbeSet};
use crate::security::access_token::{access_token_auth, AccessTokenAuth};
use crate::security::cookie_auth::{api_cookie_auth, app_cookie_auth, CookieAuth};
use crate::security::csrf::{csrf_protect, CsrfGuard};
use crate::security::headers::security_headers;

pub const API_PREFIX: &str = "/.api";
pub const INTERNAL_PREFIX: &str = "/.internal";

/// Where a path is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    ExternalApi,
    InternalApi,
    Assets,
    App,
}

fn under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Classify a request path.
pub fn classify(path: &str, assets_mount: &str) -> Destination {
    if under(path, API_PREFIX) {
        Destination::ExternalApi
    } else if under(path, INTERNAL_PREFIX) {
        Destination::InternalApi
    } else if under(path, assets_mount) {
        Destination::Assets
    } else {
        Destination::App
    }
}

/// Everything the guard stacks need, built once at startup.
#[derive(Clone)]
pub struct Guards {
    pub config: ConfigHandle,
    pub probes: Arc<ProbeSet>,
    pub access_token: Arc<AccessTokenAuth>,
    pub api_cookie: Arc<CookieAuth>,
    pub api_chain: Arc<AuthProviderChain>,
    pub app_cookie: Arc<CookieAuth>,
    pub override_auth: Arc<OverrideAuth>,
    pub app_chain: Arc<AuthProviderChain>,
    pub csrf: Arc<CsrfGuard>,
    pub assets_mount: String,
    pub assets_dir: String,
    pub request_timeout: Duration,
}

/// Builds the routers of both listeners.
pub struct RequestRouter {
    guards: Guards,
}

#[derive(Clone)]
struct ExternalRoutes {
    api: Router,
    app: Router,
    assets: Router,
    assets_mount: String,
}

impl RequestRouter {
    pub fn new(guards: Guards) -> Self {
        Self { guards }
    }

    /// API stack, outermost first: access token, cookie (marker header), auth chain.
    fn api_stack(&self, api: Router) -> Router {
        let g = &self.guards;
        api.layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state("api", track_requests))
                .layer(from_fn_with_state(g.access_token.clone(), access_token_auth))
                .layer(from_fn_with_state(g.api_cookie.clone(), api_cookie_auth))
                .layer(from_fn_with_state(g.api_chain.clone(), enforce)),
        )
    }

    /// App stack, outermost first: cookie, override, auth chain, CSRF.
    ///
    /// CSRF sits inside the chain so identity-provider posts are answered
    /// before the token check.
    fn app_stack(&self, app: Router) -> Router {
        let g = &self.guards;
        app.layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state("app", track_requests))
                .layer(from_fn_with_state(g.app_cookie.clone(), app_cookie_auth))
                .layer(from_fn_with_state(g.override_auth.clone(), override_auth))
                .layer(from_fn_with_state(g.app_chain.clone(), enforce))
                .layer(from_fn_with_state(g.csrf.clone(), csrf_protect)),
        )
    }

    fn assets(&self) -> Router {
        Router::new()
            .nest_service(
                self.guards.assets_mount.trim_end_matches('/'),
                ServeDir::new(&self.guards.assets_dir),
            )
            .layer(from_fn_with_state("assets", track_requests))
    }

    /// Router for the public listener.
    ///
    /// Outermost first: snapshot, ForbidAll, request id, tracing, black-hole,
    /// security headers, timeout, then dispatch by path.
    pub fn external(&self, surfaces: &Surfaces) -> Router {
        let g = &self.guards;
        let routes = Arc::new(ExternalRoutes {
            api: self.api_stack(surfaces.api.clone()),
            app: self.app_stack(surfaces.app.clone()),
            assets: self.assets(),
            assets_mount: g.assets_mount.clone(),
        });

        Router::new()
            .fallback(dispatch_external)
            .with_state(routes)
            .layer(
                ServiceBuilder::new()
                    .layer(from_fn_with_state(g.config.clone(), attach_snapshot))
                    .layer(from_fn_with_state(g.config.clone(), forbid_all_requests))
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(RequestSpan::new("external")))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(from_fn_with_state(g.probes.clone(), black_hole))
                    .layer(from_fn_with_state(g.config.clone(), security_headers))
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        g.request_timeout,
                    )),
            )
    }

    /// Router for the cluster-internal listener. No credential is checked.
    pub fn internal(&self, surfaces: &Surfaces) -> Router {
        let g = &self.guards;
        Router::new()
            .fallback(dispatch_internal)
            .with_state(surfaces.internal.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(from_fn_with_state(g.config.clone(), attach_snapshot))
                    .layer(from_fn_with_state(g.config.clone(), forbid_all_requests))
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(RequestSpan::new("internal")))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(from_fn_with_state("internal", track_requests))
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        g.request_timeout,
                    )),
            )
    }
}

async fn serve(router: Router, request: Request) -> Response {
    match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

async fn dispatch_external(State(routes): State<Arc<ExternalRoutes>>, request: Request) -> Response {
    match classify(request.uri().path(), &routes.assets_mount) {
        Destination::ExternalApi => serve(routes.api.clone(), request).await,
        Destination::App => serve(routes.app.clone(), request).await,
        Destination::Assets => serve(routes.assets.clone(), request).await,
        Destination::InternalApi => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn dispatch_internal(State(internal): State<Router>, request: Request) -> Response {
    match classify(request.uri().path(), "") {
        Destination::InternalApi => serve(internal, request).await,
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
