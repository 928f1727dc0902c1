//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the front door.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Chrome extension origin used by development builds.
pub const DEV_EXTENSION_ORIGIN: &str = "chrome-extension://bmfbcejdknlknpncfpeloejonjoledha";

/// Chrome extension origin used by store builds.
pub const PROD_EXTENSION_ORIGIN: &str = "chrome-extension://dgjhfomjieaadpoljlnidmbgkdffpack";

/// Root configuration for the front door.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FrontendConfig {
    /// Listener configuration (external and internal bind addresses).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cross-origin trust and hardening headers. Live-reloadable.
    pub security: SecurityConfig,

    /// Authentication providers and credential surfaces.
    pub auth: AuthConfig,

    /// Pre-authentication canned responders.
    pub probes: Vec<ProbeConfig>,

    /// Static asset serving.
    pub assets: AssetsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Public edge bind address (e.g., "0.0.0.0:3080").
    pub external_address: String,

    /// Cluster-internal bind address. Must not be reachable from the public edge.
    pub internal_address: String,

    /// Externally visible URL of the service, used for same-origin checks and cookies.
    pub external_url: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            external_address: "0.0.0.0:3080".to_string(),
            internal_address: "127.0.0.1:3090".to_string(),
            external_url: "http://localhost:3080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upper bound for a single identity-provider or store callout, in milliseconds.
    pub callout_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn callout(&self) -> Duration {
        Duration::from_millis(self.callout_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            callout_ms: 5_000,
        }
    }
}

/// Security settings consulted on every request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Whitespace-separated list of origins allowed to make credentialed cross-origin requests.
    pub cors_origin: String,

    /// Emit `Strict-Transport-Security`.
    pub enable_hsts: bool,

    /// Stop trusting the browser extension origins.
    pub disable_browser_extension: bool,

    /// Origins of the browser extension builds.
    pub extension_origins: Vec<String>,

    /// Kill-switch: reject every request with 403.
    pub forbid_all: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origin: String::new(),
            enable_hsts: false,
            disable_browser_extension: false,
            extension_origins: vec![
                DEV_EXTENSION_ORIGIN.to_string(),
                PROD_EXTENSION_ORIGIN.to_string(),
            ],
            forbid_all: false,
        }
    }
}

/// Which external surfaces a provider participates in.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SurfaceToggle {
    pub api: bool,
    pub app: bool,
}

impl Default for SurfaceToggle {
    fn default() -> Self {
        Self { api: true, app: true }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Name of the session cookie.
    pub session_cookie: String,

    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Where unauthenticated App navigations are redirected.
    pub sign_in_path: String,

    /// Path prefixes reachable without an identity.
    pub public_paths: Vec<String>,

    /// Let anonymous requests through the RequireAuthenticated gate.
    pub allow_anonymous: bool,

    /// Shared secret that authenticates App requests as `override_username`.
    pub override_secret: Option<String>,

    /// Identity granted by the override secret.
    pub override_username: String,

    /// Static access tokens mapped to usernames.
    pub access_tokens: HashMap<String, String>,

    /// Maximum urlencoded body buffered for CSRF tokens and SAML posts.
    pub max_form_bytes: usize,

    pub require_auth: RequireAuthConfig,
    pub openidconnect: OidcConfig,
    pub saml: SamlConfig,
    pub http_header: HttpHeaderConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "frontdoor_session".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 30,
            sign_in_path: "/sign-in".to_string(),
            public_paths: vec![
                "/sign-in".to_string(),
                "/.auth/".to_string(),
                "/.assets/".to_string(),
            ],
            allow_anonymous: false,
            override_secret: None,
            override_username: "override-admin".to_string(),
            access_tokens: HashMap::new(),
            max_form_bytes: 64 * 1024,
            require_auth: RequireAuthConfig::default(),
            openidconnect: OidcConfig::default(),
            saml: SamlConfig::default(),
            http_header: HttpHeaderConfig::default(),
        }
    }
}

/// RequireAuthenticated gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequireAuthConfig {
    pub enabled: bool,
    pub surfaces: SurfaceToggle,
}

impl Default for RequireAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            surfaces: SurfaceToggle::default(),
        }
    }
}

/// OpenID Connect provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OidcConfig {
    pub enabled: bool,
    pub surfaces: SurfaceToggle,
    /// Issuer authorization endpoint that login redirects to.
    pub authorization_url: String,
    /// Endpoint that validates authorization codes.
    pub verify_url: String,
    pub login_path: String,
    pub callback_path: String,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            surfaces: SurfaceToggle { api: false, app: true },
            authorization_url: String::new(),
            verify_url: String::new(),
            login_path: "/.auth/openidconnect/login".to_string(),
            callback_path: "/.auth/openidconnect/callback".to_string(),
        }
    }
}

/// SAML provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamlConfig {
    pub enabled: bool,
    pub surfaces: SurfaceToggle,
    /// IdP single sign-on URL that login redirects to.
    pub idp_sso_url: String,
    /// Endpoint that validates assertions.
    pub verify_url: String,
    pub login_path: String,
    pub acs_path: String,
}

impl Default for SamlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            surfaces: SurfaceToggle { api: false, app: true },
            idp_sso_url: String::new(),
            verify_url: String::new(),
            login_path: "/.auth/saml/login".to_string(),
            acs_path: "/.auth/saml/acs".to_string(),
        }
    }
}

/// Identity propagated by a trusted authenticating proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpHeaderConfig {
    pub enabled: bool,
    pub surfaces: SurfaceToggle,
    pub username_header: String,
    /// Prefix removed from the header value (e.g. "accounts.google.com:").
    pub strip_prefix: String,
}

impl Default for HttpHeaderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            surfaces: SurfaceToggle::default(),
            username_header: "X-Forwarded-User".to_string(),
            strip_prefix: String::new(),
        }
    }
}

/// A canned responder evaluated before authentication.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Probe identifier for logging/metrics.
    pub name: String,

    #[serde(flatten)]
    pub rule: ProbeRule,

    #[serde(default = "default_probe_status")]
    pub status: u16,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub content_type: Option<String>,
}

fn default_probe_status() -> u16 {
    410
}

/// Request predicate of a probe.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum ProbeRule {
    PathPrefix { path_prefix: String },
    PathExact { path: String },
    QueryParam { param: String, value: Option<String> },
    UserAgent { contains: String },
}

/// Static asset serving.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// URL prefix assets are mounted under.
    pub mount: String,
    /// Directory served under `mount`.
    pub dir: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            mount: "/.assets".to_string(),
            dir: "./assets".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}
