//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Request (after cookie / token / override guards)
//!     → chain.rs (AuthProviderChain, strictly in declared order)
//!         forbid_all.rs    kill-switch, always first
//!         openidconnect.rs login redirect + callback
//!         saml.rs          login redirect + assertion consumer
//!         http_header.rs   identity propagated by a trusted proxy
//!         require_auth.rs  gate for anything still anonymous
//!     → Forward(request [+ Identity]) | Terminal(response)
//! ```
//!
//! # Design Decisions
//! - Each provider either passes the request through untouched, establishes an
//!   identity, or terminates with a response; there is no partial mutation
//! - Providers only see a read-only [`chain::Inbound`] view
//! - Protocol work (OIDC, SAML) sits behind [`verifier::IdentityVerifier`]
//! - Callouts are bounded; a timeout is a rejection, never anonymous access

pub mod chain;
pub mod forbid_all;
pub mod http_header;
pub mod openidconnect;
pub mod override_auth;
pub mod require_auth;
pub mod saml;
pub mod session;
pub mod tokens;
pub mod verifier;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::config::{ConfigHandle, FrontendConfig};
use crate::http::rejection::Rejection;
use session::{CookieSettings, MemorySessionStore, SessionStore};
use tokens::{AccessTokenStore, MemoryTokenStore};
use verifier::{HttpVerifier, IdentityVerifier, VerifyError};

pub use chain::{AuthProviderChain, ChainOutcome, Inbound};

/// The external credential surfaces. Each builds its own provider chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Api,
    App,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Api => "api",
            Surface::App => "app",
        }
    }
}

/// How an identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Session,
    AccessToken,
    OpenIdConnect,
    Saml,
    HttpHeader,
    Override,
}

/// An authenticated user, stored in the request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub method: AuthMethod,
}

impl Identity {
    pub fn new(username: impl Into<String>, method: AuthMethod) -> Self {
        Self {
            username: username.into(),
            method,
        }
    }
}

/// Result of offering a request to one provider.
pub enum Decision {
    /// Precondition unmet: the request is handed on exactly as received.
    PassThrough(Inbound),
    /// Identity resolved; evaluation stops and the request is forwarded.
    Authenticated { request: Inbound, identity: Identity },
    /// The provider answered the request itself (redirects, callbacks).
    Respond(Response),
    /// The request is refused.
    Reject(Rejection),
}

/// A pluggable authentication strategy.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Disabled providers are left out of the chain and never invoked.
    fn enabled(&self) -> bool {
        true
    }

    /// Offer the request to this provider.
    async fn try_handle(&self, request: Inbound) -> Decision;
}

/// Reduce a caller-supplied return location to a same-origin path.
pub fn safe_return_to(candidate: Option<&str>) -> String {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Creates sessions for identities established by login flows.
#[derive(Clone)]
pub struct SessionIssuer {
    pub sessions: Arc<dyn SessionStore>,
    pub cookie: CookieSettings,
}

impl SessionIssuer {
    pub fn new(sessions: Arc<dyn SessionStore>, cookie: CookieSettings) -> Self {
        Self { sessions, cookie }
    }

    /// Start a session for `identity` and send the browser back to `return_to`.
    pub async fn start(&self, identity: Identity, return_to: &str) -> Decision {
        match self.sessions.create(identity).await {
            Ok(session) => {
                let mut response = Redirect::to(return_to).into_response();
                if let Some(value) = self.cookie.set(&session.id) {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Decision::Respond(response)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create session");
                Decision::Reject(Rejection::Unauthorized)
            }
        }
    }
}

/// External systems the providers and guards talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: Arc<dyn AccessTokenStore>,
    pub oidc_verifier: Arc<dyn IdentityVerifier>,
    pub saml_verifier: Arc<dyn IdentityVerifier>,
}

impl Collaborators {
    /// In-memory stores and HTTP verifiers for the configured endpoints.
    pub fn from_config(config: &FrontendConfig) -> Result<Self, reqwest::Error> {
        let callout = config.timeouts.callout();
        Ok(Self {
            sessions: Arc::new(MemorySessionStore::new(Duration::from_secs(
                config.auth.session_ttl_secs,
            ))),
            tokens: Arc::new(MemoryTokenStore::from_config(&config.auth.access_tokens)),
            oidc_verifier: Arc::new(HttpVerifier::new(
                config.auth.openidconnect.verify_url.clone(),
                callout,
            )?),
            saml_verifier: Arc::new(HttpVerifier::new(config.auth.saml.verify_url.clone(), callout)?),
        })
    }
}

/// Settings of the session cookie.
pub fn session_cookie(config: &FrontendConfig) -> CookieSettings {
    CookieSettings::new(
        config.auth.session_cookie.clone(),
        config.listener.external_url.starts_with("https://"),
        config.auth.session_ttl_secs,
    )
}

/// The provider chain for one surface: ForbidAll, OpenID Connect, SAML,
/// header propagation, then the RequireAuthenticated gate.
pub fn standard_chain(
    surface: Surface,
    config: &FrontendConfig,
    handle: ConfigHandle,
    collaborators: &Collaborators,
) -> AuthProviderChain {
    let issuer = SessionIssuer::new(collaborators.sessions.clone(), session_cookie(config));
    let callout = config.timeouts.callout();

    let providers: Vec<Arc<dyn AuthProvider>> = vec![
        Arc::new(forbid_all::ForbidAllProvider::new(handle)),
        Arc::new(openidconnect::OpenIdConnectProvider::new(
            surface,
            &config.auth.openidconnect,
            &config.listener.external_url,
            collaborators.oidc_verifier.clone(),
            issuer.clone(),
            callout,
        )),
        Arc::new(saml::SamlProvider::new(
            surface,
            &config.auth.saml,
            config.auth.max_form_bytes,
            collaborators.saml_verifier.clone(),
            issuer,
            callout,
        )),
        Arc::new(http_header::HttpHeaderProvider::new(
            surface,
            &config.auth.http_header,
        )),
        Arc::new(require_auth::RequireAuthProvider::new(surface, &config.auth)),
    ];
    AuthProviderChain::new(surface, providers)
}

/// Callout failures are fail-closed.
pub(crate) fn verification_failed(provider: &'static str, error: VerifyError) -> Decision {
    match &error {
        VerifyError::Rejected => tracing::warn!(provider, "Credential rejected"),
        VerifyError::Unavailable(_) | VerifyError::TimedOut => {
            tracing::error!(provider, error = %error, "Identity provider callout failed")
        }
    }
    Decision::Reject(Rejection::Unauthorized)
}
