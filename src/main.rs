use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use frontdoor::auth::Collaborators;
use frontdoor::config::{load_config, watcher::ConfigWatcher, FrontendConfig};
use frontdoor::http::{HttpServer, Surfaces};
use frontdoor::lifecycle::signals::spawn_signal_handler;
use frontdoor::observability::{logging, metrics};
use frontdoor::{Error, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "frontdoor", version, about = "Authenticating front door")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_addr(address: &str) -> Result<SocketAddr, Error> {
    address.parse().map_err(|source| Error::Address {
        address: address.to_string(),
        source,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FrontendConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "frontdoor starting");
    tracing::info!(
        external_address = %config.listener.external_address,
        internal_address = %config.listener.internal_address,
        external_url = %config.listener.external_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(parse_addr(&config.observability.metrics_address)?)?;
    }

    // The watcher must outlive the server.
    let (updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let external = TcpListener::bind(parse_addr(&config.listener.external_address)?).await?;
    let internal = TcpListener::bind(parse_addr(&config.listener.internal_address)?).await?;

    let collaborators = Collaborators::from_config(&config)?;
    let surfaces = Surfaces::standard(&config, &collaborators);
    let server = HttpServer::new(&config, collaborators, surfaces)?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.run(external, internal, updates, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
