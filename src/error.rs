//! Startup errors.
//!
//! Request-path failures never surface here; they are rendered as
//! [`crate::http::rejection::Rejection`]s by the guard that detects them.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("external url: {0}")]
    ExternalUrl(#[from] url::ParseError),
    #[error("identity provider client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),
    #[error("invalid address {address}: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },
}
