//! Ordered chain of authentication providers.
//!
//! Providers run strictly in declared order and never re-enter an earlier
//! provider. The first provider whose precondition holds decides: it either
//! establishes an identity (the request is forwarded with it) or terminates
//! with a response. A provider whose precondition is unmet hands back the
//! [`Inbound`] it was given; since only this module can construct an
//! `Inbound`, what reaches the next provider is the request as received.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{Extensions, HeaderMap, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use super::session::read_cookie;
use super::{AuthProvider, Decision, Identity, Surface};
use crate::http::rejection::Rejection;
use crate::observability::metrics;

/// Read-only view of a request under evaluation by the chain.
pub struct Inbound(Request);

impl Inbound {
    fn new(request: Request) -> Self {
        Self(request)
    }

    fn into_request(self) -> Request {
        self.0
    }

    pub fn method(&self) -> &Method {
        self.0.method()
    }

    pub fn uri(&self) -> &Uri {
        self.0.uri()
    }

    pub fn path(&self) -> &str {
        self.0.uri().path()
    }

    /// Path plus query, as a return location.
    pub fn path_and_query(&self) -> &str {
        self.0
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    pub fn headers(&self) -> &HeaderMap {
        self.0.headers()
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.0.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn extensions(&self) -> &Extensions {
        self.0.extensions()
    }

    /// Identity established by an earlier guard, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.0.extensions().get::<Identity>()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        read_cookie(self.0.headers(), name)
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.0.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Consume the request and decode an urlencoded body of at most `limit` bytes.
    ///
    /// Only for providers that have already decided to answer the request.
    pub async fn into_form(self, limit: usize) -> Result<HashMap<String, String>, Rejection> {
        let bytes = to_bytes(self.0.into_body(), limit)
            .await
            .map_err(|_| Rejection::Malformed)?;
        Ok(url::form_urlencoded::parse(&bytes).into_owned().collect())
    }
}

/// What the chain decided for a request.
pub enum ChainOutcome {
    Forward(Request),
    Terminal(Response),
}

/// An ordered list of providers for one surface.
pub struct AuthProviderChain {
    surface: Surface,
    providers: Vec<Arc<dyn AuthProvider>>,
}

impl AuthProviderChain {
    /// Build a chain; providers reporting themselves disabled are left out.
    pub fn new(surface: Surface, providers: Vec<Arc<dyn AuthProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .filter(|provider| {
                if !provider.enabled() {
                    debug!(surface = surface.as_str(), provider = provider.name(), "Provider disabled");
                }
                provider.enabled()
            })
            .collect::<Vec<_>>();

        info!(
            surface = surface.as_str(),
            providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "Auth provider chain built"
        );

        Self { surface, providers }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Names of the providers that will run, in order.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run the request through the providers.
    pub async fn apply(&self, request: Request) -> ChainOutcome {
        let mut inbound = Inbound::new(request);

        for provider in &self.providers {
            match provider.try_handle(inbound).await {
                Decision::PassThrough(next) => {
                    inbound = next;
                }
                Decision::Authenticated { request, identity } => {
                    metrics::record_auth_decision(provider.name(), "authenticated");
                    info!(
                        surface = self.surface.as_str(),
                        provider = provider.name(),
                        username = %identity.username,
                        "Identity established"
                    );
                    let mut request = request.into_request();
                    request.extensions_mut().insert(identity);
                    return ChainOutcome::Forward(request);
                }
                Decision::Respond(response) => {
                    metrics::record_auth_decision(provider.name(), "responded");
                    debug!(provider = provider.name(), status = %response.status(), "Provider answered request");
                    return ChainOutcome::Terminal(response);
                }
                Decision::Reject(rejection) => {
                    metrics::record_auth_decision(provider.name(), "rejected");
                    warn!(
                        surface = self.surface.as_str(),
                        provider = provider.name(),
                        kind = rejection.kind(),
                        "Request rejected"
                    );
                    return ChainOutcome::Terminal(rejection.into_response());
                }
            }
        }

        ChainOutcome::Forward(inbound.into_request())
    }
}

/// Middleware running a surface's chain in front of its handlers.
pub async fn enforce(
    State(chain): State<Arc<AuthProviderChain>>,
    request: Request,
    next: Next,
) -> Response {
    match chain.apply(request).await {
        ChainOutcome::Forward(request) => next.run(request).await,
        ChainOutcome::Terminal(response) => response,
    }
}
