//! Identity-provider callouts.
//!
//! OIDC code exchange and SAML assertion validation are opaque to the front
//! door: a provider hands the credential to an [`IdentityVerifier`] and gets a
//! username back. Every call is bounded by [`bounded_verify`]; dropping the
//! request future drops the callout with it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credential presented to an identity provider.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    AuthorizationCode { code: String, redirect_uri: String },
    Assertion { assertion: String },
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("credential rejected by identity provider")]
    Rejected,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity provider timed out")]
    TimedOut,
}

/// Protocol-specific credential validation.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: Credential) -> Result<String, VerifyError>;
}

/// Run a verification under `limit`.
pub async fn bounded_verify(
    verifier: &dyn IdentityVerifier,
    credential: Credential,
    limit: Duration,
) -> Result<String, VerifyError> {
    match tokio::time::timeout(limit, verifier.verify(credential)).await {
        Ok(result) => result,
        Err(_) => Err(VerifyError::TimedOut),
    }
}

#[derive(Debug, Deserialize)]
struct VerifiedIdentity {
    username: String,
}

/// Delegates validation to an HTTP endpoint.
///
/// The credential is POSTed as JSON; a 2xx answer carrying `{"username": ..}`
/// is a success, 4xx is a rejection and anything else is unavailability.
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVerifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpVerifier {
    async fn verify(&self, credential: Credential) -> Result<String, VerifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&credential)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifyError::TimedOut
                } else {
                    VerifyError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(VerifyError::Rejected);
        }
        if !status.is_success() {
            return Err(VerifyError::Unavailable(format!("status {status}")));
        }

        let identity: VerifiedIdentity = response
            .json()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;
        if identity.username.trim().is_empty() {
            return Err(VerifyError::Rejected);
        }
        Ok(identity.username)
    }
}
