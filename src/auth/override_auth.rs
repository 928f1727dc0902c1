//! Shared-secret override for the App surface.
//!
//! Inert without a configured secret. A request presenting the header is
//! authenticated as the override user when the secret matches and rejected
//! when it does not.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::{AuthMethod, Identity};
use crate::config::AuthConfig;
use crate::http::rejection::Rejection;

pub const OVERRIDE_HEADER: &str = "x-override-auth-secret";

#[derive(Debug, Clone)]
pub struct OverrideAuth {
    secret: Option<String>,
    username: String,
}

impl OverrideAuth {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            secret: config.override_secret.clone().filter(|s| !s.is_empty()),
            username: config.override_username.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    fn matches(&self, presented: &[u8]) -> bool {
        match &self.secret {
            Some(secret) => secret.as_bytes().ct_eq(presented).into(),
            None => false,
        }
    }
}

pub async fn override_auth(
    State(guard): State<Arc<OverrideAuth>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !guard.is_enabled() || request.extensions().get::<Identity>().is_some() {
        return next.run(request).await;
    }
    let Some(presented) = request.headers().get(OVERRIDE_HEADER) else {
        return next.run(request).await;
    };

    if !guard.matches(presented.as_bytes()) {
        warn!("Override secret mismatch");
        return Rejection::Unauthorized.into_response();
    }

    info!(username = %guard.username, "Override authentication");
    request
        .extensions_mut()
        .insert(Identity::new(guard.username.clone(), AuthMethod::Override));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn whoami(identity: Option<Extension<Identity>>) -> String {
        identity
            .map(|Extension(identity)| identity.username)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(secret: Option<&str>) -> Router {
        let guard = Arc::new(OverrideAuth::from_config(&AuthConfig {
            override_secret: secret.map(str::to_string),
            ..AuthConfig::default()
        }));
        Router::new()
            .route("/", get(whoami))
            .layer(middleware::from_fn_with_state(guard, override_auth))
    }

    async fn call(app: Router, secret: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/");
        if let Some(secret) = secret {
            builder = builder.header("X-Override-Auth-Secret", secret);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn matching_secret_authenticates() {
        let (status, body) = call(app(Some("s3cret")), Some("s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "override-admin");
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let (status, _) = call(app(Some("s3cret")), Some("guess")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inert_without_secret() {
        let (status, body) = call(app(None), Some("anything")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }
}
