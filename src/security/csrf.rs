//! Synchronizer-token CSRF protection for the External-App surface.
//!
//! Safe requests are issued a random token in the `csrf_token` cookie and can
//! read it from the request extensions as [`CsrfToken`] to embed in forms.
//! Tokens are remembered server-side: a cookie value this process never
//! issued, or one past its lifetime, is replaced on safe requests and refused
//! on unsafe ones. Unsafe requests must echo the cookie's token through the
//! `X-Csrf-Token` header or a `csrf_token` urlencoded form field. Over https
//! they must also declare our own origin through `Origin` or `Referer`.
//!
//! This guard sits inside the App auth chain: identity-provider callbacks are
//! answered by the chain before reaching it.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;
use url::Url;

use crate::auth::session::{read_cookie, CookieSettings};
use crate::http::rejection::Rejection;
use crate::security::nonce::NonceStore;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_FIELD: &str = "csrf_token";

const TOKEN_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// The CSRF token in force for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

pub struct CsrfGuard {
    cookie: CookieSettings,
    tokens: NonceStore<()>,
    external_origin: String,
    strict_origin: bool,
    max_form_bytes: usize,
}

impl CsrfGuard {
    /// `strict_origin` is set when the service is reached over https.
    pub fn new(external_origin: impl Into<String>, strict_origin: bool, max_form_bytes: usize) -> Self {
        Self {
            cookie: CookieSettings::new(CSRF_COOKIE, strict_origin, TOKEN_TTL.as_secs()),
            tokens: NonceStore::new(TOKEN_TTL),
            external_origin: external_origin.into(),
            strict_origin,
            max_form_bytes,
        }
    }

    fn issued(&self, token: &str) -> bool {
        is_well_formed(token) && self.tokens.contains(token)
    }

    fn declares_own_origin(&self, headers: &HeaderMap) -> bool {
        let declared = headers
            .get(header::ORIGIN)
            .or_else(|| headers.get(header::REFERER))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Url::parse(v).ok())
            .map(|url| url.origin().ascii_serialization());
        declared.as_deref() == Some(self.external_origin.as_str())
    }
}

fn is_well_formed(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

fn tokens_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

pub async fn csrf_protect(
    State(guard): State<Arc<CsrfGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let existing = read_cookie(request.headers(), CSRF_COOKIE)
        .filter(|token| guard.issued(token))
        .map(str::to_owned);

    if is_safe(request.method()) {
        return issue(&guard, existing, request, next).await;
    }

    match verify(&guard, existing, request).await {
        Ok(request) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    }
}

async fn issue(guard: &CsrfGuard, existing: Option<String>, mut request: Request, next: Next) -> Response {
    let (token, fresh) = match existing {
        Some(token) => (token, false),
        None => (guard.tokens.issue(()), true),
    };
    request.extensions_mut().insert(CsrfToken(token.clone()));

    let mut response = next.run(request).await;
    if fresh {
        if let Some(cookie) = guard.cookie.set(&token) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

async fn verify(
    guard: &CsrfGuard,
    existing: Option<String>,
    request: Request,
) -> Result<Request, Rejection> {
    if guard.strict_origin && !guard.declares_own_origin(request.headers()) {
        warn!(method = %request.method(), "Unsafe request without same-origin Origin or Referer");
        return Err(Rejection::CsrfRejected);
    }
    let Some(expected) = existing else {
        warn!(method = %request.method(), "Unsafe request without an issued CSRF cookie");
        return Err(Rejection::CsrfRejected);
    };

    let from_header = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let (request, presented) = match from_header {
        Some(token) => (request, Some(token)),
        None => form_token(request, guard.max_form_bytes).await?,
    };

    match presented {
        Some(token) if tokens_match(&expected, &token) => {
            let mut request = request;
            request.extensions_mut().insert(CsrfToken(expected));
            Ok(request)
        }
        _ => {
            warn!(method = %request.method(), "CSRF token missing or mismatched");
            Err(Rejection::CsrfRejected)
        }
    }
}

/// Read `csrf_token` from an urlencoded body, handing back the request with its body restored.
async fn form_token(request: Request, limit: usize) -> Result<(Request, Option<String>), Rejection> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(|_| Rejection::Malformed)?;
    let token = url::form_urlencoded::parse(&bytes)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned());
    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        middleware,
        routing::{get, post},
        Extension, Router,
    };
    use tower::ServiceExt;

    const FORGED: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn guard(strict: bool) -> Arc<CsrfGuard> {
        let origin = if strict { "https://search.example" } else { "http://localhost:3080" };
        Arc::new(CsrfGuard::new(origin, strict, 1024))
    }

    fn app(guard: Arc<CsrfGuard>) -> Router {
        Router::new()
            .route("/form", get(|Extension(token): Extension<CsrfToken>| async move { token.0 }))
            .route("/settings", post(|body: String| async move { body }))
            .layer(middleware::from_fn_with_state(guard, csrf_protect))
    }

    fn post_request(headers: &[(&str, &str)], body: &str) -> Request {
        let mut builder = Request::builder().method(Method::POST).uri("/settings");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn safe_request_is_issued_a_token() {
        let guard = guard(false);
        let response = app(guard.clone())
            .oneshot(Request::builder().uri("/form").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("csrf_token="));
        assert!(!cookie.contains("Secure"));
        let token = body_text(response).await;
        assert!(is_well_formed(&token));
        assert!(cookie.contains(&token));
        assert!(guard.issued(&token));
    }

    #[tokio::test]
    async fn existing_token_is_reused() {
        let guard = guard(false);
        let token = guard.tokens.issue(());
        let response = app(guard)
            .oneshot(
                Request::builder()
                    .uri("/form")
                    .header(header::COOKIE, format!("csrf_token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(!response.headers().contains_key(header::SET_COOKIE));
        assert_eq!(body_text(response).await, token);
    }

    #[tokio::test]
    async fn unissued_cookie_is_replaced_on_safe_request() {
        let response = app(guard(false))
            .oneshot(
                Request::builder()
                    .uri("/form")
                    .header(header::COOKIE, format!("csrf_token={FORGED}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        let token = body_text(response).await;
        assert_ne!(token, FORGED);
        assert!(cookie.starts_with(&format!("csrf_token={token};")));
    }

    #[tokio::test]
    async fn matching_but_unissued_token_is_rejected() {
        let cookie = format!("csrf_token={FORGED}");
        let response = app(guard(false))
            .oneshot(post_request(&[("Cookie", &cookie), ("X-Csrf-Token", FORGED)], "payload"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_without_token_is_rejected() {
        let guard = guard(false);
        let token = guard.tokens.issue(());
        let cookie = format!("csrf_token={token}");
        let response = app(guard.clone())
            .oneshot(post_request(&[("Cookie", &cookie)], "name=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(guard)
            .oneshot(post_request(&[("X-Csrf-Token", &token)], ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn header_token_is_accepted() {
        let guard = guard(false);
        let token = guard.tokens.issue(());
        let cookie = format!("csrf_token={token}");
        let response = app(guard)
            .oneshot(post_request(&[("Cookie", &cookie), ("X-Csrf-Token", &token)], "payload"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "payload");
    }

    #[tokio::test]
    async fn form_token_is_accepted_and_body_restored() {
        let guard = guard(false);
        let token = guard.tokens.issue(());
        let cookie = format!("csrf_token={token}");
        let body = format!("name=x&csrf_token={token}");
        let response = app(guard)
            .oneshot(post_request(
                &[
                    ("Cookie", &cookie),
                    ("Content-Type", "application/x-www-form-urlencoded"),
                ],
                &body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, body);
    }

    #[tokio::test]
    async fn mismatched_token_is_rejected() {
        let guard = guard(false);
        let token = guard.tokens.issue(());
        let other = guard.tokens.issue(());
        let cookie = format!("csrf_token={token}");
        let response = app(guard)
            .oneshot(post_request(&[("Cookie", &cookie), ("X-Csrf-Token", &other)], ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn https_requires_same_origin_declaration() {
        let guard = guard(true);
        let token = guard.tokens.issue(());
        let cookie = format!("csrf_token={token}");
        let missing = app(guard.clone())
            .oneshot(post_request(&[("Cookie", &cookie), ("X-Csrf-Token", &token)], ""))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::FORBIDDEN);

        let foreign = app(guard.clone())
            .oneshot(post_request(
                &[
                    ("Cookie", &cookie),
                    ("X-Csrf-Token", &token),
                    ("Referer", "https://evil.example/page"),
                ],
                "",
            ))
            .await
            .unwrap();
        assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

        let own = app(guard)
            .oneshot(post_request(
                &[
                    ("Cookie", &cookie),
                    ("X-Csrf-Token", &token),
                    ("Referer", "https://search.example/settings"),
                ],
                "",
            ))
            .await
            .unwrap();
        assert_eq!(own.status(), StatusCode::OK);
    }
}
