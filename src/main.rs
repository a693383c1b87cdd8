//! Supervised prefork HTTP worker.
//!
//! # Architecture Overview
//!
//! ```text
//!   parent (workers > 0)                    worker (one per index, or the only process)
//!  ┌─────────────────────┐   spawn N      ┌──────────────────────────────────────────┐
//!  │ cluster::forker     │───────────────▶│ store::StoreGate::init                   │
//!  │ cluster::supervisor │                │ net::Listener::bind (SO_REUSEPORT)       │
//!  │   waits, forwards   │   SIGTERM      │ http::HttpServer                         │
//!  │   SIGTERM           │───────────────▶│   filter → routes → liveness → NOT_FOUND │
//!  └─────────────────────┘                │ health::HealthProbe (bounded loop)       │
//!                                         │ lifecycle::coordinate (drain → close)    │
//!                                         └──────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Instrument;

use prefork_server::app;
use prefork_server::cluster::ProcessRole;
use prefork_server::config::{loader, ConfigError, ServerConfig};
use prefork_server::lifecycle::{run_parent, run_worker, signals, ExitOutcome, Shutdown, TermSignals};
use prefork_server::observability::{logging, metrics};
use prefork_server::store;

#[derive(Parser, Debug)]
#[command(name = "prefork-server")]
#[command(about = "Supervised prefork HTTP worker", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "PREFORK_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Number of worker processes (0 serves from this process)
    #[arg(short, long, env = "WORKERS")]
    workers: Option<usize>,

    /// Per-request deadline in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Externally visible base URL used in the startup health-check hint
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,
}

impl Cli {
    fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => loader::load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(workers) = self.workers {
            config.cluster.workers = workers;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.timeouts.request_secs = secs;
        }
        if let Some(url) = &self.public_url {
            config.listener.public_url = Some(url.clone());
        }

        loader::finalize(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitOutcome::Failed.into();
        }
    };

    logging::init_logging(&config.observability);

    let role = ProcessRole::detect(config.cluster.workers);
    let span = tracing::info_span!("worker", role = %role, pid = std::process::id());

    run(config, role).instrument(span).await.into()
}

async fn run(config: ServerConfig, role: ProcessRole) -> ExitOutcome {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        workers = config.cluster.workers,
        request_timeout_secs = config.timeouts.request_secs,
        "prefork-server starting"
    );

    if config.observability.metrics_enabled && role != ProcessRole::Parent {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(metrics::worker_metrics_addr(addr, role.worker_index())),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    match TermSignals::install() {
        Ok(signals) => {
            tokio::spawn(signals::listen(signals, shutdown.clone()).in_current_span());
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return ExitOutcome::Failed;
        }
    }

    match role {
        ProcessRole::Parent => run_parent(config.cluster.workers, shutdown).await,
        ProcessRole::Worker { .. } => {
            let backing = store::from_config(&config.store);
            run_worker(config, app::routes(), backing, role, shutdown).await
        }
    }
}
