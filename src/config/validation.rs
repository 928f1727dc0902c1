//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listener addresses and the external URL
//! - Reject CORS entries that exact matching cannot honor
//! - Check that enabled providers carry their endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FrontendConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on reload

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::FrontendConfig;
use crate::routing::router::{API_PREFIX, INTERNAL_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("external and internal listeners share the address {0}")]
    SharedListener(String),
    #[error("{field}: expected an absolute http(s) URL, got {value:?}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("security.cors_origin: wildcard entry {0:?} is not supported")]
    WildcardOrigin(String),
    #[error("{field}: invalid header name {value:?}")]
    InvalidHeader { field: &'static str, value: String },
    #[error("{field}: path {value:?} must start with '/'")]
    InvalidPath { field: &'static str, value: String },
    #[error("probe {name}: status {status} is not a valid HTTP status")]
    InvalidStatus { name: String, status: u16 },
    #[error("timeouts.callout_ms must be greater than zero")]
    ZeroCalloutTimeout,
    #[error("auth.session_cookie must be a non-empty cookie name")]
    InvalidCookieName,
    #[error("assets.mount {0:?} collides with the root or a reserved prefix")]
    ReservedMount(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &FrontendConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let external = check_address("listener.external_address", &config.listener.external_address, &mut errors);
    let internal = check_address("listener.internal_address", &config.listener.internal_address, &mut errors);
    if let (Some(external), Some(internal)) = (external, internal) {
        if external == internal {
            errors.push(ValidationError::SharedListener(external.to_string()));
        }
    }

    check_url("listener.external_url", &config.listener.external_url, &mut errors);

    for origin in config.security.cors_origin.split_whitespace() {
        if origin.contains('*') {
            errors.push(ValidationError::WildcardOrigin(origin.to_string()));
        }
    }

    if config.timeouts.callout_ms == 0 {
        errors.push(ValidationError::ZeroCalloutTimeout);
    }

    let auth = &config.auth;
    if auth.session_cookie.is_empty()
        || auth
            .session_cookie
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | ',' | '='))
    {
        errors.push(ValidationError::InvalidCookieName);
    }
    check_path("auth.sign_in_path", &auth.sign_in_path, &mut errors);

    if auth.openidconnect.enabled {
        check_url("auth.openidconnect.authorization_url", &auth.openidconnect.authorization_url, &mut errors);
        check_url("auth.openidconnect.verify_url", &auth.openidconnect.verify_url, &mut errors);
        check_path("auth.openidconnect.login_path", &auth.openidconnect.login_path, &mut errors);
        check_path("auth.openidconnect.callback_path", &auth.openidconnect.callback_path, &mut errors);
    }

    if auth.saml.enabled {
        check_url("auth.saml.idp_sso_url", &auth.saml.idp_sso_url, &mut errors);
        check_url("auth.saml.verify_url", &auth.saml.verify_url, &mut errors);
        check_path("auth.saml.login_path", &auth.saml.login_path, &mut errors);
        check_path("auth.saml.acs_path", &auth.saml.acs_path, &mut errors);
    }

    if auth.http_header.enabled
        && HeaderName::from_bytes(auth.http_header.username_header.as_bytes()).is_err()
    {
        errors.push(ValidationError::InvalidHeader {
            field: "auth.http_header.username_header",
            value: auth.http_header.username_header.clone(),
        });
    }

    for probe in &config.probes {
        if !(100..=599).contains(&probe.status) {
            errors.push(ValidationError::InvalidStatus {
                name: probe.name.clone(),
                status: probe.status,
            });
        }
        match &probe.rule {
            crate::config::ProbeRule::PathPrefix { path_prefix: path }
            | crate::config::ProbeRule::PathExact { path } => {
                check_path("probes.path", path, &mut errors);
            }
            _ => {}
        }
    }

    check_path("assets.mount", &config.assets.mount, &mut errors);
    let mount = config.assets.mount.trim_end_matches('/');
    if mount.is_empty() || mount == API_PREFIX || mount == INTERNAL_PREFIX {
        errors.push(ValidationError::ReservedMount(config.assets.mount.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

fn check_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    let valid = Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

fn check_path(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if !value.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field,
            value: value.to_string(),
        });
    }
}
