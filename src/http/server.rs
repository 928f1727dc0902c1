//! HTTP server setup.
//!
//! # Responsibilities
//! - Build every guard and provider once from the startup configuration
//! - Assemble the external and internal routers
//! - Serve both listeners until the shutdown signal
//! - Publish reloaded `[security]` sections to the runtime snapshot
//! - Purge expired sessions in the background

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use url::Url;

use crate::auth::override_auth::OverrideAuth;
use crate::auth::session::SessionStore;
use crate::auth::{session_cookie, standard_chain, Collaborators, Surface};
use crate::config::{ConfigHandle, FrontendConfig};
use crate::error::Error;
use crate::http::handlers::Surfaces;
use crate::lifecycle::shutdown::{wait, Shutdown};
use crate::routing::probes::ProbeSet;
use crate::routing::router::{Guards, RequestRouter};
use crate::security::access_token::AccessTokenAuth;
use crate::security::cookie_auth::CookieAuth;
use crate::security::csrf::CsrfGuard;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// The front door: one public listener, one cluster-internal listener.
pub struct HttpServer {
    handle: ConfigHandle,
    sessions: Arc<dyn SessionStore>,
    external: Router,
    internal: Router,
}

impl HttpServer {
    /// Create the server. Only `[security]` can change after this point.
    pub fn new(
        config: &FrontendConfig,
        collaborators: Collaborators,
        surfaces: Surfaces,
    ) -> Result<Self, Error> {
        let external_url = Url::parse(&config.listener.external_url)?;
        let external_origin = external_url.origin().ascii_serialization();
        let strict_origin = external_url.scheme() == "https";

        let handle = ConfigHandle::new(config.security.clone());
        let callout = config.timeouts.callout();
        let cookie = session_cookie(config);

        let api_chain = standard_chain(Surface::Api, config, handle.clone(), &collaborators);
        let app_chain = standard_chain(Surface::App, config, handle.clone(), &collaborators);
        tracing::info!(
            api = ?api_chain.provider_names(),
            app = ?app_chain.provider_names(),
            "Authentication chains built"
        );

        let cookie_auth = |surface| {
            Arc::new(CookieAuth::new(
                surface,
                collaborators.sessions.clone(),
                cookie.clone(),
                external_origin.clone(),
                config.auth.sign_in_path.clone(),
                handle.clone(),
            ))
        };

        let guards = Guards {
            config: handle.clone(),
            probes: Arc::new(ProbeSet::from_config(&config.probes)),
            access_token: Arc::new(AccessTokenAuth::new(collaborators.tokens.clone(), callout)),
            api_cookie: cookie_auth(Surface::Api),
            api_chain: Arc::new(api_chain),
            app_cookie: cookie_auth(Surface::App),
            override_auth: Arc::new(OverrideAuth::from_config(&config.auth)),
            app_chain: Arc::new(app_chain),
            csrf: Arc::new(CsrfGuard::new(
                external_origin.clone(),
                strict_origin,
                config.auth.max_form_bytes,
            )),
            assets_mount: config.assets.mount.clone(),
            assets_dir: config.assets.dir.clone(),
            request_timeout: config.timeouts.request(),
        };

        let router = RequestRouter::new(guards);
        Ok(Self {
            external: router.external(&surfaces),
            internal: router.internal(&surfaces),
            handle,
            sessions: collaborators.sessions,
        })
    }

    pub fn external_router(&self) -> Router {
        self.external.clone()
    }

    pub fn internal_router(&self) -> Router {
        self.internal.clone()
    }

    pub fn config_handle(&self) -> ConfigHandle {
        self.handle.clone()
    }

    /// Serve both listeners until `shutdown` fires.
    pub async fn run(
        self,
        external: TcpListener,
        internal: TcpListener,
        updates: mpsc::UnboundedReceiver<FrontendConfig>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %external.local_addr()?, "External listener starting");
        tracing::info!(address = %internal.local_addr()?, "Internal listener starting");

        let reload = tokio::spawn(apply_reloads(
            self.handle.clone(),
            updates,
            shutdown.subscribe(),
        ));
        let purge = tokio::spawn(purge_sessions(self.sessions.clone(), shutdown.subscribe()));

        let external = axum::serve(external, self.external)
            .with_graceful_shutdown(wait(shutdown.subscribe()))
            .into_future();
        let internal = axum::serve(internal, self.internal)
            .with_graceful_shutdown(wait(shutdown.subscribe()))
            .into_future();

        let result = tokio::try_join!(external, internal);
        reload.abort();
        purge.abort();

        tracing::info!("HTTP server stopped");
        result.map(|_| ())
    }
}

async fn apply_reloads(
    handle: ConfigHandle,
    mut updates: mpsc::UnboundedReceiver<FrontendConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => {
                    handle.publish(config.security);
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

async fn purge_sessions(sessions: Arc<dyn SessionStore>, mut shutdown: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = sessions.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Purged expired sessions");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
