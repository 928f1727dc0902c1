//! Identity propagated by a trusted authenticating proxy.

use async_trait::async_trait;
use axum::http::HeaderName;
use tracing::warn;

use super::{AuthMethod, AuthProvider, Decision, Identity, Inbound, Surface};
use crate::config::HttpHeaderConfig;
use crate::http::rejection::Rejection;

pub struct HttpHeaderProvider {
    enabled: bool,
    header: Option<HeaderName>,
    strip_prefix: String,
}

impl HttpHeaderProvider {
    pub fn new(surface: Surface, config: &HttpHeaderConfig) -> Self {
        let header = HeaderName::from_bytes(config.username_header.as_bytes()).ok();
        if config.enabled && header.is_none() {
            warn!("http_header provider enabled with an invalid header name, provider disabled");
        }
        let surface_enabled = match surface {
            Surface::Api => config.surfaces.api,
            Surface::App => config.surfaces.app,
        };

        Self {
            enabled: config.enabled && surface_enabled && header.is_some(),
            header,
            strip_prefix: config.strip_prefix.clone(),
        }
    }
}

#[async_trait]
impl AuthProvider for HttpHeaderProvider {
    fn name(&self) -> &'static str {
        "http_header"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn try_handle(&self, request: Inbound) -> Decision {
        let Some(header) = &self.header else {
            return Decision::PassThrough(request);
        };
        if request.identity().is_some() {
            return Decision::PassThrough(request);
        }
        let Some(raw) = request.headers().get(header) else {
            return Decision::PassThrough(request);
        };

        let username = match raw.to_str() {
            Ok(value) => value
                .strip_prefix(self.strip_prefix.as_str())
                .unwrap_or(value)
                .to_string(),
            Err(_) => return Decision::Reject(Rejection::Unauthorized),
        };
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Decision::Reject(Rejection::Unauthorized);
        }

        Decision::Authenticated {
            request,
            identity: Identity::new(username, AuthMethod::HttpHeader),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProviderChain, ChainOutcome};
    use crate::config::SurfaceToggle;
    use axum::{body::Body, extract::Request, http::StatusCode};
    use std::sync::Arc;

    fn chain(strip_prefix: &str) -> AuthProviderChain {
        let provider = HttpHeaderProvider::new(
            Surface::Api,
            &HttpHeaderConfig {
                enabled: true,
                surfaces: SurfaceToggle::default(),
                username_header: "X-Forwarded-User".to_string(),
                strip_prefix: strip_prefix.to_string(),
            },
        );
        AuthProviderChain::new(Surface::Api, vec![Arc::new(provider)])
    }

    fn with_user(value: &str) -> Request {
        Request::builder()
            .uri("/.api/search")
            .header("X-Forwarded-User", value)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn prefix_is_stripped() {
        let chain = chain("accounts.google.com:");
        match chain.apply(with_user("accounts.google.com:erin")).await {
            ChainOutcome::Forward(request) => assert_eq!(
                request.extensions().get::<Identity>().map(|i| i.username.as_str()),
                Some("erin")
            ),
            ChainOutcome::Terminal(_) => panic!("expected identity"),
        }
    }

    #[tokio::test]
    async fn blank_or_spaced_values_are_rejected() {
        let chain = chain("");
        for value in ["", "two words"] {
            match chain.apply(with_user(value)).await {
                ChainOutcome::Terminal(response) => {
                    assert_eq!(response.status(), StatusCode::UNAUTHORIZED)
                }
                ChainOutcome::Forward(_) => panic!("accepted {value:?}"),
            }
        }
    }

    #[test]
    fn disabled_unless_configured() {
        let provider = HttpHeaderProvider::new(Surface::App, &HttpHeaderConfig::default());
        assert!(!provider.enabled());
    }
}
