//! Cross-origin trust decisions.
//!
//! An origin is trusted when it exactly equals one of the browser extension
//! origins (and the extension integration is enabled) or one of the entries of
//! the whitespace-separated `cors_origin` list. Matching is byte-for-byte
//! equality; there is no wildcard, suffix or case folding, so
//! `https://evil.com.attacker.io` never matches `https://evil.com`.

use crate::config::SecurityConfig;

/// Outcome of evaluating a request's `Origin` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustDecision {
    /// The origin may make credentialed cross-origin requests.
    pub is_trusted_origin: bool,
    /// Value for `Access-Control-Allow-Origin`, if any.
    pub allowed_origin_to_echo: Option<String>,
    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

/// Evaluates origins against the configured allow-lists.
#[derive(Debug, Clone, Default)]
pub struct TrustEvaluator {
    extension_origins: Vec<String>,
    extension_enabled: bool,
    allowed_origins: Vec<String>,
}

impl TrustEvaluator {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            extension_origins: config.extension_origins.clone(),
            extension_enabled: !config.disable_browser_extension,
            allowed_origins: config
                .cors_origin
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }

    /// True when `origin` is a browser extension origin and the integration is enabled.
    pub fn is_extension_origin(&self, origin: &str) -> bool {
        self.extension_enabled && self.extension_origins.iter().any(|o| o == origin)
    }

    /// True when `origin` may receive credentialed cross-origin responses.
    pub fn is_trusted_origin(&self, origin: &str) -> bool {
        self.is_extension_origin(origin) || self.allowed_origins.iter().any(|o| o == origin)
    }

    /// Whether a static allow-list is configured.
    pub fn has_allow_list(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Decide the CORS response for a request carrying `origin`.
    ///
    /// A request whose `Origin` is present but untrusted never gets an
    /// `Access-Control-Allow-Origin` header. Requests without an `Origin`
    /// receive the configured origin when exactly one is configured.
    pub fn decide(&self, origin: Option<&str>) -> TrustDecision {
        let is_extension = origin.is_some_and(|o| self.is_extension_origin(o));
        let is_trusted_origin = origin.is_some_and(|o| self.is_trusted_origin(o));

        if !self.has_allow_list() && !is_extension {
            return TrustDecision {
                is_trusted_origin,
                allowed_origin_to_echo: None,
                allow_credentials: false,
            };
        }

        let allowed_origin_to_echo = match origin {
            Some(origin) if is_trusted_origin => Some(origin.to_string()),
            Some(_) => None,
            None if self.allowed_origins.len() == 1 => Some(self.allowed_origins[0].clone()),
            None => None,
        };

        TrustDecision {
            is_trusted_origin,
            allowed_origin_to_echo,
            allow_credentials: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEV_EXTENSION_ORIGIN, PROD_EXTENSION_ORIGIN};

    fn evaluator(cors_origin: &str, disable_extension: bool) -> TrustEvaluator {
        TrustEvaluator::from_config(&SecurityConfig {
            cors_origin: cors_origin.to_string(),
            disable_browser_extension: disable_extension,
            ..SecurityConfig::default()
        })
    }

    #[test]
    fn exact_match_only() {
        let trust = evaluator("https://evil.com https://good.example", false);
        assert!(trust.is_trusted_origin("https://evil.com"));
        assert!(trust.is_trusted_origin("https://good.example"));
        assert!(!trust.is_trusted_origin("https://evil.com.attacker.io"));
        assert!(!trust.is_trusted_origin("https://sub.good.example"));
        assert!(!trust.is_trusted_origin("https://EVIL.com"));
        assert!(!trust.is_trusted_origin(""));
    }

    #[test]
    fn extension_origins_follow_the_feature_flag() {
        let enabled = evaluator("", false);
        assert!(enabled.is_trusted_origin(DEV_EXTENSION_ORIGIN));
        assert!(enabled.is_trusted_origin(PROD_EXTENSION_ORIGIN));

        let disabled = evaluator("", true);
        assert!(!disabled.is_trusted_origin(DEV_EXTENSION_ORIGIN));
        assert!(!disabled.is_trusted_origin(PROD_EXTENSION_ORIGIN));
    }

    #[test]
    fn untrusted_origin_is_never_echoed() {
        let trust = evaluator("https://good.example", false);
        let decision = trust.decide(Some("https://good.example.attacker.io"));
        assert!(!decision.is_trusted_origin);
        assert_eq!(decision.allowed_origin_to_echo, None);
        assert!(decision.allow_credentials);
    }

    #[test]
    fn trusted_origin_is_echoed() {
        let trust = evaluator("https://a.example https://b.example", false);
        let decision = trust.decide(Some("https://b.example"));
        assert!(decision.is_trusted_origin);
        assert_eq!(decision.allowed_origin_to_echo.as_deref(), Some("https://b.example"));
    }

    #[test]
    fn missing_origin_echoes_single_configured_origin() {
        assert_eq!(
            evaluator("https://a.example", false)
                .decide(None)
                .allowed_origin_to_echo
                .as_deref(),
            Some("https://a.example")
        );
        assert_eq!(
            evaluator("https://a.example https://b.example", false)
                .decide(None)
                .allowed_origin_to_echo,
            None
        );
    }

    #[test]
    fn no_cors_without_allow_list_or_extension() {
        let decision = evaluator("", false).decide(Some("https://a.example"));
        assert_eq!(
            decision,
            TrustDecision {
                is_trusted_origin: false,
                allowed_origin_to_echo: None,
                allow_credentials: false,
            }
        );

        let extension = evaluator("", false).decide(Some(PROD_EXTENSION_ORIGIN));
        assert!(extension.allow_credentials);
        assert_eq!(extension.allowed_origin_to_echo.as_deref(), Some(PROD_EXTENSION_ORIGIN));
    }
}
