//! SAML login.
//!
//! The login path redirects to the IdP with a `RelayState`; the assertion
//! consumer path receives the POSTed `SAMLResponse`, validates it through the
//! verifier and starts a session. The ACS post carries no CSRF token, which is
//! why this chain sits outside the App CSRF guard.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::Method,
    response::{IntoResponse, Redirect},
};
use tracing::warn;
use url::Url;

use super::verifier::{bounded_verify, Credential, IdentityVerifier};
use super::{
    safe_return_to, verification_failed, AuthMethod, AuthProvider, Decision, Identity, Inbound,
    SessionIssuer, Surface,
};
use crate::config::SamlConfig;
use crate::http::rejection::Rejection;

pub struct SamlProvider {
    enabled: bool,
    login_path: String,
    acs_path: String,
    idp_sso_url: Option<Url>,
    max_form_bytes: usize,
    verifier: Arc<dyn IdentityVerifier>,
    issuer: SessionIssuer,
    callout: Duration,
}

impl SamlProvider {
    pub fn new(
        surface: Surface,
        config: &SamlConfig,
        max_form_bytes: usize,
        verifier: Arc<dyn IdentityVerifier>,
        issuer: SessionIssuer,
        callout: Duration,
    ) -> Self {
        let idp_sso_url = Url::parse(&config.idp_sso_url).ok();
        if config.enabled && idp_sso_url.is_none() {
            warn!("SAML enabled without a usable idp_sso_url, provider disabled");
        }
        let surface_enabled = match surface {
            Surface::Api => config.surfaces.api,
            Surface::App => config.surfaces.app,
        };

        Self {
            enabled: config.enabled && surface_enabled && idp_sso_url.is_some(),
            login_path: config.login_path.clone(),
            acs_path: config.acs_path.clone(),
            idp_sso_url,
            max_form_bytes,
            verifier,
            issuer,
            callout,
        }
    }

    fn login(&self, request: &Inbound) -> Decision {
        let Some(mut target) = self.idp_sso_url.clone() else {
            return Decision::Reject(Rejection::Malformed);
        };
        let relay_state = safe_return_to(request.query_param("returnTo").as_deref());
        target
            .query_pairs_mut()
            .append_pair("RelayState", &relay_state);
        Decision::Respond(Redirect::to(target.as_str()).into_response())
    }

    async fn consume_assertion(&self, request: Inbound) -> Decision {
        if request.method() != Method::POST {
            return Decision::Reject(Rejection::Malformed);
        }
        let mut form = match request.into_form(self.max_form_bytes).await {
            Ok(form) => form,
            Err(rejection) => return Decision::Reject(rejection),
        };
        let Some(assertion) = form.remove("SAMLResponse").filter(|a| !a.is_empty()) else {
            return Decision::Reject(Rejection::Malformed);
        };
        let return_to = safe_return_to(form.get("RelayState").map(String::as_str));

        match bounded_verify(
            self.verifier.as_ref(),
            Credential::Assertion { assertion },
            self.callout,
        )
        .await
        {
            Ok(username) => {
                self.issuer
                    .start(Identity::new(username, AuthMethod::Saml), &return_to)
                    .await
            }
            Err(e) => verification_failed(self.name(), e),
        }
    }
}

#[async_trait]
impl AuthProvider for SamlProvider {
    fn name(&self) -> &'static str {
        "saml"
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
        if request.path() == self.acs_path {
            return self.consume_assertion(request).await;
        }
        Decision::PassThrough(request)
    }
}
