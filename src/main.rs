use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use healthcheck_proxy::config::{load_config, watcher::ConfigWatcher, ProxyConfig};
use healthcheck_proxy::http::HttpServer;
use healthcheck_proxy::lifecycle::Shutdown;
use healthcheck_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "healthcheck-proxy", version)]
#[command(about = "HTTP proxy that answers load balancer health checks", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not reload the configuration file when it changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path),
        None => Ok(ProxyConfig::default()),
    };
    let observability = config
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_default();
    logging::init_logging(&observability);

    let config = config.inspect_err(|e| tracing::error!(error = %e, "Failed to load configuration"))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "healthcheck-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        node_cluster = %config.node.cluster_name,
        pass_through = config.health_check.pass_through_mode,
        cache_time_ms = ?config.health_check.cache_time_ms,
        clusters = config.clusters.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher must stay alive for as long as the server runs.
    let (config_updates, _watcher) = match &args.config {
        Some(path) if !args.no_watch => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        _ => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
