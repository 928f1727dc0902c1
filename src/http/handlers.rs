//! Terminal handlers behind the guard stacks.
//!
//! The front door does not render the product; these are the minimal
//! endpoints it needs itself (sign-in, sign-out, identity echo, liveness).
//! Embedders replace them by building their own [`Surfaces`].

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::session::{read_cookie, CookieSettings, SessionStore};
use crate::auth::{safe_return_to, session_cookie, Collaborators, Identity};
use crate::config::FrontendConfig;
use crate::security::csrf::{CsrfToken, CSRF_FIELD};

pub const SIGN_OUT_PATH: &str = "/.auth/sign-out";

/// The routers the guard stacks wrap, one per destination.
///
/// Routes are declared with their full path: classification does not strip
/// the surface prefix.
#[derive(Clone)]
pub struct Surfaces {
    pub api: Router,
    pub app: Router,
    pub internal: Router,
}

impl Surfaces {
    pub fn standard(config: &FrontendConfig, collaborators: &Collaborators) -> Self {
        let links = SignInLinks::from_config(config);
        let sign_out = Arc::new(SignOut {
            sessions: collaborators.sessions.clone(),
            cookie: session_cookie(config),
        });

        let api = Router::new()
            .route("/.api/whoami", get(whoami))
            .fallback(api_not_found);

        let app = Router::new()
            .route(
                &config.auth.sign_in_path,
                get(sign_in_page).with_state(Arc::new(links)),
            )
            .route(SIGN_OUT_PATH, post(sign_out_handler).with_state(sign_out))
            .fallback(app_page);

        let internal = Router::new().route("/.internal/ping", get(|| async { "pong" }));

        Self { api, app, internal }
    }
}

async fn whoami(identity: Option<Extension<Identity>>) -> Json<serde_json::Value> {
    match identity {
        Some(Extension(identity)) => Json(json!({
            "username": identity.username,
            "method": identity.method,
        })),
        None => Json(json!({ "username": null })),
    }
}

async fn api_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}

struct SignInLinks {
    oidc: Option<String>,
    saml: Option<String>,
}

impl SignInLinks {
    fn from_config(config: &FrontendConfig) -> Self {
        let auth = &config.auth;
        Self {
            oidc: (auth.openidconnect.enabled && auth.openidconnect.surfaces.app)
                .then(|| auth.openidconnect.login_path.clone()),
            saml: (auth.saml.enabled && auth.saml.surfaces.app).then(|| auth.saml.login_path.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignInQuery {
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

async fn sign_in_page(
    State(links): State<Arc<SignInLinks>>,
    Query(query): Query<SignInQuery>,
) -> Html<String> {
    let return_to = safe_return_to(query.return_to.as_deref());
    let encoded: String = url::form_urlencoded::byte_serialize(return_to.as_bytes()).collect();

    let mut items = String::new();
    for (label, path) in [("OpenID Connect", &links.oidc), ("SAML", &links.saml)] {
        if let Some(path) = path {
            items.push_str(&format!(
                "<li><a href=\"{}?returnTo={}\">Sign in with {}</a></li>",
                escape(path),
                encoded,
                label
            ));
        }
    }
    if items.is_empty() {
        items.push_str("<li>No sign-in method is configured.</li>");
    }

    Html(format!(
        "<!doctype html><html><head><title>Sign in</title></head><body><ul>{items}</ul></body></html>"
    ))
}

struct SignOut {
    sessions: Arc<dyn SessionStore>,
    cookie: CookieSettings,
}

async fn sign_out_handler(State(sign_out): State<Arc<SignOut>>, request: Request) -> Response {
    if let Some(id) = read_cookie(request.headers(), &sign_out.cookie.name) {
        if let Err(e) = sign_out.sessions.revoke(id).await {
            tracing::error!(error = %e, "Failed to revoke session");
        }
    }
    let mut response = Redirect::to("/").into_response();
    if let Some(value) = sign_out.cookie.clear() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

async fn app_page(
    identity: Option<Extension<Identity>>,
    token: Option<Extension<CsrfToken>>,
) -> Html<String> {
    let greeting = match identity {
        Some(Extension(identity)) => format!("Signed in as {}.", escape(&identity.username)),
        None => "Browsing anonymously.".to_string(),
    };
    let form = match token {
        Some(Extension(CsrfToken(token))) => format!(
            "<form method=\"post\" action=\"{SIGN_OUT_PATH}\">\
             <input type=\"hidden\" name=\"{CSRF_FIELD}\" value=\"{}\">\
             <button type=\"submit\">Sign out</button></form>",
            escape(&token)
        ),
        None => String::new(),
    };
    Html(format!(
        "<!doctype html><html><head><title>Search</title></head><body><p>{greeting}</p>{form}</body></html>"
    ))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
