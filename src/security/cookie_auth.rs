//! Session cookie authentication.
//!
//! The two external surfaces accept the same session cookie under different
//! CSRF defenses:
//! - API: the cookie only counts when the `X-Requested-With` marker header is
//!   present, and a declared `Origin` must be our own or trusted. Browsers do
//!   not attach custom headers to cross-site requests without a pre-flight.
//! - App: the cookie is accepted as is; forms are covered by the
//!   synchronizer-token guard further in.
//!
//! A cookie that does not resolve to a live session is a rejection and the
//! cookie is cleared.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::auth::session::{read_cookie, CookieSettings, SessionStore};
use crate::auth::{AuthMethod, Identity, Surface};
use crate::config::ConfigHandle;
use crate::http::rejection::Rejection;

pub const MARKER_HEADER: &str = "x-requested-with";

const API_VARY: &str = "Cookie, Authorization, X-Requested-With";

pub struct CookieAuth {
    surface: Surface,
    sessions: Arc<dyn SessionStore>,
    cookie: CookieSettings,
    external_origin: String,
    sign_in_path: String,
    config: ConfigHandle,
}

impl CookieAuth {
    pub fn new(
        surface: Surface,
        sessions: Arc<dyn SessionStore>,
        cookie: CookieSettings,
        external_origin: impl Into<String>,
        sign_in_path: impl Into<String>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            surface,
            sessions,
            cookie,
            external_origin: external_origin.into(),
            sign_in_path: sign_in_path.into(),
            config,
        }
    }

    /// Resolve the session cookie, if any, into an identity.
    async fn authenticate(&self, request: &mut Request) -> Result<(), Response> {
        if request.extensions().get::<Identity>().is_some() {
            return Ok(());
        }
        let Some(session_id) =
            read_cookie(request.headers(), &self.cookie.name).map(str::to_owned)
        else {
            return Ok(());
        };

        if self.surface == Surface::Api {
            self.check_api_preconditions(request)?;
        }

        match self.sessions.lookup(&session_id).await {
            Ok(Some(session)) => {
                debug!(surface = self.surface.as_str(), "Session cookie accepted");
                request.extensions_mut().insert(Identity::new(
                    session.identity.username,
                    AuthMethod::Session,
                ));
                Ok(())
            }
            Ok(None) => {
                warn!(surface = self.surface.as_str(), "Unknown or expired session");
                Err(self.reject_session(request))
            }
            Err(e) => {
                error!(surface = self.surface.as_str(), error = %e, "Session lookup failed");
                Err(self.reject_session(request))
            }
        }
    }

    fn check_api_preconditions(&self, request: &Request) -> Result<(), Response> {
        if !request.headers().contains_key(MARKER_HEADER) {
            warn!("API session cookie without marker header");
            return Err(Rejection::CsrfRejected.into_response());
        }
        if let Some(origin) = request.headers().get(header::ORIGIN) {
            let origin = origin.to_str().unwrap_or_default();
            let trusted = origin == self.external_origin
                || self
                    .config
                    .for_request(request.extensions())
                    .trust
                    .is_trusted_origin(origin);
            if !trusted {
                warn!("API session cookie from untrusted origin");
                return Err(Rejection::CsrfRejected.into_response());
            }
        }
        Ok(())
    }

    fn reject_session(&self, request: &Request) -> Response {
        let navigation = matches!(*request.method(), Method::GET | Method::HEAD);
        let rejection = if self.surface == Surface::App && navigation {
            let return_to: String = url::form_urlencoded::byte_serialize(
                request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/")
                    .as_bytes(),
            )
            .collect();
            Rejection::Unauthenticated {
                redirect_to: Some(format!("{}?returnTo={}", self.sign_in_path, return_to)),
            }
        } else {
            Rejection::Unauthorized
        };

        let mut response = rejection.into_response();
        if let Some(clear) = self.cookie.clear() {
            response.headers_mut().append(header::SET_COOKIE, clear);
        }
        response
    }
}

/// Cookie authentication for the External-API surface.
pub async fn api_cookie_auth(
    State(guard): State<Arc<CookieAuth>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match guard.authenticate(&mut request).await {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static(API_VARY));
    response
}

/// Cookie authentication for the External-App surface.
pub async fn app_cookie_auth(
    State(guard): State<Arc<CookieAuth>>,
    mut request: Request,
    next: Next,
) -> Response {
    match guard.authenticate(&mut request).await {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::MemorySessionStore;
    use crate::config::SecurityConfig;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        middleware,
        routing::any,
        Extension, Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    async fn whoami(identity: Option<Extension<Identity>>) -> String {
        identity
            .map(|Extension(identity)| identity.username)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    async fn setup(surface: Surface) -> (Router, String) {
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        let session = sessions
            .create(Identity::new("alice", AuthMethod::OpenIdConnect))
            .await
            .unwrap();
        let guard = Arc::new(CookieAuth::new(
            surface,
            sessions,
            CookieSettings::new("sid", false, 60),
            "https://search.example",
            "/sign-in",
            ConfigHandle::new(SecurityConfig {
                cors_origin: "https://partner.example".to_string(),
                ..SecurityConfig::default()
            }),
        ));
        let router = Router::new().route("/{*path}", any(whoami));
        let router = match surface {
            Surface::Api => router.layer(middleware::from_fn_with_state(guard, api_cookie_auth)),
            Surface::App => router.layer(middleware::from_fn_with_state(guard, app_cookie_auth)),
        };
        (router, session.id)
    }

    async fn call(app: Router, headers: &[(&str, &str)]) -> (StatusCode, Response) {
        let mut builder = Request::builder().uri("/.api/whoami");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        (response.status(), response)
    }

    async fn body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn api_cookie_requires_marker_header() {
        let (app, id) = setup(Surface::Api).await;
        let cookie = format!("sid={id}");
        let (status, response) = call(app, &[("Cookie", &cookie)]).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[header::VARY],
            "Cookie, Authorization, X-Requested-With"
        );
    }

    #[tokio::test]
    async fn api_cookie_with_marker_authenticates() {
        let (app, id) = setup(Surface::Api).await;
        let cookie = format!("sid={id}");
        let (status, response) =
            call(app, &[("Cookie", &cookie), ("X-Requested-With", "Client")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body(response).await, "alice");
    }

    #[tokio::test]
    async fn api_cookie_origin_must_be_ours_or_trusted() {
        let (app, id) = setup(Surface::Api).await;
        let cookie = format!("sid={id}");
        for (origin, expected) in [
            ("https://search.example", StatusCode::OK),
            ("https://partner.example", StatusCode::OK),
            ("https://search.example.evil.io", StatusCode::FORBIDDEN),
        ] {
            let (status, _) = call(
                app.clone(),
                &[("Cookie", &cookie), ("X-Requested-With", "x"), ("Origin", origin)],
            )
            .await;
            assert_eq!(status, expected, "{origin}");
        }
    }

    #[tokio::test]
    async fn unknown_session_is_rejected_and_cleared() {
        let (app, _) = setup(Surface::Api).await;
        let (status, response) =
            call(app, &[("Cookie", "sid=stale"), ("X-Requested-With", "x")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("sid=;"));
    }

    #[tokio::test]
    async fn app_cookie_needs_no_marker() {
        let (app, id) = setup(Surface::App).await;
        let cookie = format!("sid={id}");
        let (status, response) = call(app, &[("Cookie", &cookie)]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body(response).await, "alice");
    }

    #[tokio::test]
    async fn app_stale_session_redirects_to_sign_in() {
        let (app, _) = setup(Surface::App).await;
        let (status, response) = call(app, &[("Cookie", "sid=stale")]).await;
        assert_eq!(status, StatusCode::FOUND);
        assert!(response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .starts_with("/sign-in?returnTo="));
    }

    #[tokio::test]
    async fn no_cookie_stays_anonymous() {
        let (app, _) = setup(Surface::Api).await;
        let (status, response) = call(app, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body(response).await, "anonymous");
    }
}
