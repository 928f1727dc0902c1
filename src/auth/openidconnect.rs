//! OpenID Connect login.
//!
//! Owns two paths: the login path redirects to the issuer's authorization
//! endpoint, and the callback path exchanges the authorization code through
//! the verifier and starts a session. Every other request passes through.
//!
//! The `state` sent to the issuer is a server-issued nonce that also travels
//! in a short-lived cookie. A callback is honored only when both agree and the
//! nonce has not been used before; the return path is recovered from the nonce.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header;
use axum::response::{IntoResponse, Redirect};
use subtle::ConstantTimeEq;
use tracing::warn;
use url::Url;

use super::session::{read_cookie, CookieSettings};
use super::verifier::{bounded_verify, Credential, IdentityVerifier};
use super::{
    safe_return_to, verification_failed, AuthMethod, AuthProvider, Decision, Identity, Inbound,
    SessionIssuer, Surface,
};
use crate::config::OidcConfig;
use crate::http::rejection::Rejection;
use crate::security::nonce::NonceStore;

pub const STATE_COOKIE: &str = "frontdoor_oidc_state";
const STATE_TTL: Duration = Duration::from_secs(600);

pub struct OpenIdConnectProvider {
    enabled: bool,
    login_path: String,
    callback_path: String,
    authorization_url: Option<Url>,
    redirect_uri: String,
    verifier: Arc<dyn IdentityVerifier>,
    issuer: SessionIssuer,
    callout: Duration,
    states: NonceStore<String>,
    state_cookie: CookieSettings,
}

impl OpenIdConnectProvider {
    pub fn new(
        surface: Surface,
        config: &OidcConfig,
        external_url: &str,
        verifier: Arc<dyn IdentityVerifier>,
        issuer: SessionIssuer,
        callout: Duration,
    ) -> Self {
        let authorization_url = Url::parse(&config.authorization_url).ok();
        if config.enabled && authorization_url.is_none() {
            warn!("OpenID Connect enabled without a usable authorization_url, provider disabled");
        }
        let surface_enabled = match surface {
            Surface::Api => config.surfaces.api,
            Surface::App => config.surfaces.app,
        };
        let state_cookie =
            CookieSettings::new(STATE_COOKIE, issuer.cookie.secure, STATE_TTL.as_secs());

        Self {
            enabled: config.enabled && surface_enabled && authorization_url.is_some(),
            login_path: config.login_path.clone(),
            callback_path: config.callback_path.clone(),
            authorization_url,
            redirect_uri: format!("{}{}", external_url.trim_end_matches('/'), config.callback_path),
            verifier,
            issuer,
            callout,
            states: NonceStore::new(STATE_TTL),
            state_cookie,
        }
    }

    fn login(&self, request: &Inbound) -> Decision {
        let Some(mut target) = self.authorization_url.clone() else {
            return Decision::Reject(Rejection::Malformed);
        };
        let return_to = safe_return_to(request.query_param("returnTo").as_deref());
        let state = self.states.issue(return_to);
        target
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", &state);

        let mut response = Redirect::to(target.as_str()).into_response();
        if let Some(value) = self.state_cookie.set(&state) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Decision::Respond(response)
    }

    /// The return path bound to `state`, if the browser presenting it is the
    /// one the login was started from.
    fn redeem_state(&self, state: Option<&str>, cookie: Option<&str>) -> Option<String> {
        let (state, cookie) = (state?, cookie?);
        if !bool::from(state.as_bytes().ct_eq(cookie.as_bytes())) {
            return None;
        }
        self.states.take(state)
    }

    async fn callback(
        &self,
        code: Option<String>,
        state: Option<String>,
        state_cookie: Option<String>,
    ) -> Decision {
        let Some(code) = code else {
            return Decision::Reject(Rejection::Malformed);
        };
        let Some(return_to) = self.redeem_state(state.as_deref(), state_cookie.as_deref()) else {
            warn!("OpenID Connect callback with an unknown or unbound state");
            return Decision::Reject(Rejection::CsrfRejected);
        };

        let credential = Credential::AuthorizationCode {
            code,
            redirect_uri: self.redirect_uri.clone(),
        };
        let decision = match bounded_verify(self.verifier.as_ref(), credential, self.callout).await {
            Ok(username) => {
                self.issuer
                    .start(Identity::new(username, AuthMethod::OpenIdConnect), &return_to)
                    .await
            }
            Err(e) => verification_failed(self.name(), e),
        };
        match decision {
            Decision::Respond(mut response) => {
                if let Some(value) = self.state_cookie.clear() {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Decision::Respond(response)
            }
            other => other,
        }
    }
}

#[async_trait]
impl AuthProvider for OpenIdConnectProvider {
    fn name(&self) -> &'static str {
        "openidconnect"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn try_handle(&self, request: Inbound) -> Decision {
        if request.identity().is_some() {
            return Decision::PassThrough(request);
        }
        if request.path() == self.login_path {
            return self.login(&request);
        }
        if request.path() == self.callback_path {
            let code = request.query_param("code");
            let state = request.query_param("state");
            let state_cookie =
                read_cookie(request.headers(), &self.state_cookie.name).map(str::to_string);
            return self.callback(code, state, state_cookie).await;
        }
        Decision::PassThrough(request)
    }
}
