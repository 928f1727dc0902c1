//! Terminal failure responses.
//!
//! Every guard and provider resolves failure locally into a [`Rejection`].
//! Bodies are fixed strings: this is the pre-authentication attack surface, so
//! no configuration values, collaborator errors or internal detail are ever
//! rendered.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No credential. Navigations are redirected to `redirect_to`, others get a challenge.
    #[error("authentication required")]
    Unauthenticated { redirect_to: Option<String> },
    /// Invalid, expired or unverifiable credential.
    #[error("invalid credentials")]
    Unauthorized,
    /// A cross-site request forgery precondition was not met.
    #[error("cross-site request rejected")]
    CsrfRejected,
    /// The kill-switch is active.
    #[error("forbidden")]
    Forbidden,
    /// Traffic the front door refuses to interpret.
    #[error("malformed request")]
    Malformed,
}

impl Rejection {
    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Unauthenticated { .. } => "unauthenticated",
            Rejection::Unauthorized => "unauthorized",
            Rejection::CsrfRejected => "csrf_rejected",
            Rejection::Forbidden => "forbidden",
            Rejection::Malformed => "malformed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Unauthenticated {
                redirect_to: Some(_),
            } => StatusCode::FOUND,
            Rejection::Unauthenticated { redirect_to: None } | Rejection::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            Rejection::CsrfRejected | Rejection::Forbidden => StatusCode::FORBIDDEN,
            Rejection::Malformed => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        metrics::record_rejection(self.kind());

        let status = self.status();
        let body = match &self {
            Rejection::Unauthenticated { .. } => "Authentication required",
            Rejection::Unauthorized => "Invalid credentials",
            Rejection::CsrfRejected => "Cross-site request rejected",
            Rejection::Forbidden => "Forbidden",
            Rejection::Malformed => "Bad request",
        };

        let mut response = (status, body).into_response();
        match self {
            Rejection::Unauthenticated {
                redirect_to: Some(location),
            } => match HeaderValue::from_str(&location) {
                Ok(value) => {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                Err(_) => {
                    *response.status_mut() = StatusCode::UNAUTHORIZED;
                }
            },
            Rejection::Unauthenticated { redirect_to: None } | Rejection::Unauthorized => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(r#"Bearer realm="frontdoor""#),
                );
            }
            _ => {}
        }
        response
    }
}
