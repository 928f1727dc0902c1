//! Per-request spans.
//!
//! The span carries method, path and the request id assigned by the outer
//! request-id layer. The query string is left out: it can carry codes and
//! tokens on the login callbacks.

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Span maker for `TraceLayer`.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpan {
    listener: &'static str,
}

impl RequestSpan {
    pub fn new(listener: &'static str) -> Self {
        Self { listener }
    }
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        tracing::info_span!(
            "request",
            listener = self.listener,
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_built_without_subscriber() {
        let request = Request::builder()
            .uri("/.auth/openidconnect/callback?code=secret")
            .header(X_REQUEST_ID, "abc")
            .body(())
            .unwrap();
        let span = RequestSpan::new("external").make_span(&request);
        // Disabled without a subscriber; building it must not panic.
        let _entered = span.enter();
    }
}
