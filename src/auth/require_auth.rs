//! Gate for requests still anonymous at the end of the chain.

use async_trait::async_trait;
use axum::http::Method;

use super::{AuthProvider, Decision, Inbound, Surface};
use crate::config::AuthConfig;
use crate::http::rejection::Rejection;

pub struct RequireAuthProvider {
    surface: Surface,
    enabled: bool,
    allow_anonymous: bool,
    public_paths: Vec<String>,
    sign_in_path: String,
}

impl RequireAuthProvider {
    pub fn new(surface: Surface, config: &AuthConfig) -> Self {
        let surface_enabled = match surface {
            Surface::Api => config.require_auth.surfaces.api,
            Surface::App => config.require_auth.surfaces.app,
        };
        Self {
            surface,
            enabled: config.require_auth.enabled && surface_enabled,
            allow_anonymous: config.allow_anonymous,
            public_paths: config.public_paths.clone(),
            sign_in_path: config.sign_in_path.clone(),
        }
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| {
            if public.ends_with('/') {
                path.starts_with(public.as_str()) || path == public.trim_end_matches('/')
            } else {
                path == public
                    || path
                        .strip_prefix(public.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        })
    }

    fn challenge(&self, request: &Inbound) -> Rejection {
        let navigation = matches!(*request.method(), Method::GET | Method::HEAD);
        if self.surface == Surface::App && navigation {
            let return_to: String =
                url::form_urlencoded::byte_serialize(request.path_and_query().as_bytes()).collect();
            Rejection::Unauthenticated {
                redirect_to: Some(format!("{}?returnTo={}", self.sign_in_path, return_to)),
            }
        } else {
            Rejection::Unauthenticated { redirect_to: None }
        }
    }
}

#[async_trait]
impl AuthProvider for RequireAuthProvider {
    fn name(&self) -> &'static str {
        "require_auth"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn try_handle(&self, request: Inbound) -> Decision {
        if request.identity().is_some() || self.allow_anonymous || self.is_public(request.path()) {
            return Decision::PassThrough(request);
        }
        Decision::Reject(self.challenge(&request))
    }
}
