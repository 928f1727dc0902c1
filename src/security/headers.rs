//! Hardening headers and CORS.
//!
//! # Responsibilities
//! - Stamp the fixed hardening headers on every external response
//! - Emit CORS headers according to the request's [`TrustDecision`]
//! - Answer `OPTIONS` pre-flights without invoking anything further in
//!
//! # Design Decisions
//! - Runs outside every authentication layer, so pre-flights never reach a
//!   provider and rejections carry the same headers as successes
//! - Defaults only: a header already set by the inner handler is kept
//! - Reads trust from the request's runtime snapshot

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::{ConfigHandle, RuntimeSnapshot};
use crate::security::trust::TrustDecision;

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// CSRF marker, client identifier and content type.
pub const ALLOWED_HEADERS: &str = "X-Requested-With, X-Search-Client, Content-Type";

const HSTS: &str = "max-age=8640000";

pub async fn security_headers(
    State(config): State<ConfigHandle>,
    request: Request,
    next: Next,
) -> Response {
    let snapshot = config.for_request(request.extensions());
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let decision = snapshot.trust.decide(origin.as_deref());

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        apply(headers, &snapshot, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply(response.headers_mut(), &snapshot, &decision);
    response
}

fn apply(headers: &mut HeaderMap, snapshot: &RuntimeSnapshot, decision: &TrustDecision) {
    headers
        .entry(header::X_CONTENT_TYPE_OPTIONS)
        .or_insert(HeaderValue::from_static("nosniff"));
    headers
        .entry(header::X_XSS_PROTECTION)
        .or_insert(HeaderValue::from_static("1; mode=block"));
    headers
        .entry(header::X_FRAME_OPTIONS)
        .or_insert(HeaderValue::from_static("DENY"));
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-cache, max-age=0"));
    if snapshot.security.enable_hsts {
        headers
            .entry(header::STRICT_TRANSPORT_SECURITY)
            .or_insert(HeaderValue::from_static(HSTS));
    }

    if decision.allow_credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    match decision
        .allowed_origin_to_echo
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
    {
        Some(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        None => {
            headers.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SecurityConfig, DEV_EXTENSION_ORIGIN};
    use axum::{body::Body, middleware, routing::any, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(security: SecurityConfig, hits: Arc<AtomicUsize>) -> Router {
        let handle = ConfigHandle::new(security);
        Router::new()
            .route(
                "/{*path}",
                any(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        (StatusCode::UNAUTHORIZED, "nope")
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(handle, security_headers))
    }

    fn request(method: Method, origin: Option<&str>) -> Request {
        let mut builder = Request::builder().method(method).uri("/.api/search");
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn hardening_headers_on_error_responses() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(
            SecurityConfig {
                enable_hsts: true,
                ..SecurityConfig::default()
            },
            hits,
        )
        .oneshot(request(Method::GET, None))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, max-age=0");
        assert_eq!(headers[header::STRICT_TRANSPORT_SECURITY], HSTS);
    }

    #[tokio::test]
    async fn hsts_only_when_enabled() {
        let response = app(SecurityConfig::default(), Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert!(!response.headers().contains_key(header::STRICT_TRANSPORT_SECURITY));
    }

    #[tokio::test]
    async fn preflight_never_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(SecurityConfig::default(), hits.clone())
            .oneshot(request(Method::OPTIONS, Some("https://unknown.example")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
        assert!(allowed.contains("X-Requested-With"));
        assert!(allowed.contains("Content-Type"));
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn trusted_origin_is_echoed() {
        let security = SecurityConfig {
            cors_origin: "https://a.example https://b.example".to_string(),
            ..SecurityConfig::default()
        };
        let response = app(security, Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Method::GET, Some("https://b.example")))
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://b.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(headers.get_all(header::VARY).iter().any(|v| v == "Origin"));
    }

    #[tokio::test]
    async fn untrusted_origins_never_get_allow_origin() {
        let security = SecurityConfig {
            cors_origin: "https://evil.com".to_string(),
            ..SecurityConfig::default()
        };
        for origin in [
            "https://evil.com.attacker.io",
            "http://evil.com",
            "null",
            "chrome-extension://unknown",
        ] {
            for method in [Method::GET, Method::POST, Method::OPTIONS] {
                let response = app(security.clone(), Arc::new(AtomicUsize::new(0)))
                    .oneshot(request(method.clone(), Some(origin)))
                    .await
                    .unwrap();
                assert!(
                    !response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN),
                    "{method} {origin}"
                );
            }
        }
    }

    #[tokio::test]
    async fn extension_origin_trusted_without_allow_list() {
        let response = app(SecurityConfig::default(), Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Method::GET, Some(DEV_EXTENSION_ORIGIN)))
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            DEV_EXTENSION_ORIGIN
        );

        let disabled = SecurityConfig {
            disable_browser_extension: true,
            ..SecurityConfig::default()
        };
        let response = app(disabled, Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Method::GET, Some(DEV_EXTENSION_ORIGIN)))
            .await
            .unwrap();
        assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
