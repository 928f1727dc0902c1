//! Access token authentication for the External-API surface.
//!
//! Accepts `Authorization: token <t>` or `Authorization: Bearer <t>` and
//! resolves the token independently of any cookie. A present but unusable
//! `Authorization` header is a rejection, not an anonymous request.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::auth::tokens::AccessTokenStore;
use crate::auth::{AuthMethod, Identity};
use crate::http::rejection::Rejection;

pub struct AccessTokenAuth {
    tokens: Arc<dyn AccessTokenStore>,
    callout: Duration,
}

impl AccessTokenAuth {
    pub fn new(tokens: Arc<dyn AccessTokenStore>, callout: Duration) -> Self {
        Self { tokens, callout }
    }
}

/// Extract the token from an `Authorization` value.
pub fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !token.is_empty() && !token.contains(char::is_whitespace)).then_some(token)
}

pub async fn access_token_auth(
    State(guard): State<Arc<AccessTokenAuth>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match authenticate(&guard, &mut request).await {
        Ok(()) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

async fn authenticate(guard: &AccessTokenAuth, request: &mut Request) -> Result<(), Rejection> {
    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        return Ok(());
    };
    let token = value
        .to_str()
        .ok()
        .and_then(parse_authorization)
        .map(str::to_owned)
        .ok_or_else(|| {
            warn!("Unsupported authorization header");
            Rejection::Unauthorized
        })?;

    match tokio::time::timeout(guard.callout, guard.tokens.lookup(&token)).await {
        Ok(Ok(Some(username))) => {
            debug!(username = %username, "Access token accepted");
            request
                .extensions_mut()
                .insert(Identity::new(username, AuthMethod::AccessToken));
            Ok(())
        }
        Ok(Ok(None)) => {
            warn!("Unknown access token");
            Err(Rejection::Unauthorized)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Access token lookup failed");
            Err(Rejection::Unauthorized)
        }
        Err(_) => {
            error!("Access token lookup timed out");
            Err(Rejection::Unauthorized)
        }
    }
}
