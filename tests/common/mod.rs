//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{routing::post, Json, Router};
use frontdoor::auth::Collaborators;
use frontdoor::http::{HttpServer, Surfaces};
use frontdoor::{FrontendConfig, Shutdown};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A front door running on loopback listeners.
pub struct TestFrontdoor {
    pub external: SocketAddr,
    pub internal: SocketAddr,
    pub updates: mpsc::UnboundedSender<FrontendConfig>,
    pub shutdown: Shutdown,
    task: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestFrontdoor {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.external, path)
    }

    pub fn internal_url(&self, path: &str) -> String {
        format!("http://{}{}", self.internal, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.task).await;
    }
}

/// Start the front door with `config`; listener addresses in `config` are ignored.
pub async fn start_frontdoor(config: FrontendConfig) -> TestFrontdoor {
    let external = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let internal = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let external_addr = external.local_addr().unwrap();
    let internal_addr = internal.local_addr().unwrap();

    let collaborators = Collaborators::from_config(&config).unwrap();
    let surfaces = Surfaces::standard(&config, &collaborators);
    let server = HttpServer::new(&config, collaborators, surfaces).unwrap();

    let (updates, rx) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(external, internal, rx, shutdown.clone()));

    TestFrontdoor {
        external: external_addr,
        internal: internal_addr,
        updates,
        shutdown,
        task,
    }
}

/// Start an identity verification endpoint that accepts every credential as `username`.
pub async fn start_verifier(username: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route(
        "/verify",
        post(move || async move { Json(json!({ "username": username })) }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/verify")
}

/// Client that never follows redirects and keeps no cookie jar.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Value of cookie `name` from the response's `Set-Cookie` headers.
pub fn set_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
