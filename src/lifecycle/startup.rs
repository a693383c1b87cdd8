//! Startup orchestration.
//!
//! # Responsibilities
//! - Parent: fork the worker pool and supervise it
//! - Worker: initialize the store, bind, serve, start the probe loop
//! - Hand a running worker to the shutdown coordinator
//!
//! # Design Decisions
//! - The store is ready before the port is bound
//! - A bind failure closes the already-initialized store before exiting
//! - The probe loop runs as its own task and never blocks serving

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::cluster::{fork_workers, supervise, ExecSpawner, ProcessRole};
use crate::config::ServerConfig;
use crate::health::{HealthProbe, HealthProbeState, HttpProbe, Liveness};
use crate::http::server::{HttpServer, ServerHandle};
use crate::lifecycle::shutdown::{coordinate, ExitOutcome, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::store::{BackingStore, StoreError, StoreGate};

/// Errors that prevent a worker from serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// A worker that is bound and serving.
pub struct RunningWorker {
    server: ServerHandle,
    store: StoreGate,
    probe: Option<JoinHandle<HealthProbeState>>,
}

impl RunningWorker {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Serve until `shutdown` is triggered, then drain and release the store.
    pub async fn wait(self, shutdown: &Shutdown) -> ExitOutcome {
        let outcome = coordinate(shutdown, self.server, self.store).await;
        if let Some(probe) = self.probe {
            probe.abort();
        }
        outcome
    }
}

/// Bring a worker up: store, listener, server, probe loop.
///
/// No port is bound when store initialization fails.
pub async fn start_worker(
    config: ServerConfig,
    routes: Router,
    store: Arc<dyn BackingStore>,
    role: ProcessRole,
    shutdown: &Shutdown,
) -> Result<RunningWorker, StartupError> {
    let store = StoreGate::init(store).await?;

    let listener = match Listener::bind(&config.listener, role.shares_port()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Bind failed, releasing backing store");
            // The bind error is what gets reported; close failures are logged by the gate.
            let _ = store.close().await;
            return Err(e.into());
        }
    };
    let local_addr = listener.local_addr();

    let health_url = config.health_check_url();
    let probe_config = config.health_probe.clone();
    let health_path = config.http.health_path.clone();

    let server = HttpServer::new(config, routes, Liveness::new(role.worker_index()));
    let server = server.start(listener, shutdown);
    tracing::info!(health_check_url = %health_url, "Worker serving");

    let probe = if probe_config.enabled {
        let probe = HttpProbe::new(local_addr, &health_path, probe_config.timeout());
        let task = HealthProbe::new(&probe_config, probe).run(shutdown.subscribe());
        Some(tokio::spawn(task.in_current_span()))
    } else {
        tracing::debug!("Health probe disabled");
        None
    };

    Ok(RunningWorker {
        server,
        store,
        probe,
    })
}

/// Run one worker to completion and return its exit outcome.
pub async fn run_worker(
    config: ServerConfig,
    routes: Router,
    store: Arc<dyn BackingStore>,
    role: ProcessRole,
    shutdown: Shutdown,
) -> ExitOutcome {
    match start_worker(config, routes, store, role, &shutdown).await {
        Ok(worker) => worker.wait(&shutdown).await,
        Err(e) => {
            tracing::error!(error = %e, "Worker failed to start");
            ExitOutcome::Failed
        }
    }
}

/// Fork `workers` copies of this binary and supervise them.
pub async fn run_parent(workers: usize, shutdown: Shutdown) -> ExitOutcome {
    let spawner = match ExecSpawner::current_exe() {
        Ok(spawner) => spawner,
        Err(e) => {
            tracing::error!(error = %e, "Cannot locate current executable");
            return ExitOutcome::Failed;
        }
    };

    tracing::info!(workers, "Forking worker pool");
    let children = fork_workers(&spawner, workers);
    supervise(children, shutdown)
        .instrument(tracing::info_span!("supervisor"))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    #[derive(Default)]
    struct FlakyStore {
        fail_init: bool,
        inits: AtomicUsize,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl BackingStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn init(&self) -> Result<(), StoreError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(StoreError::Init {
                    store: "flaky".into(),
                    reason: "unreachable".into(),
                });
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), StoreError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    const STANDALONE: ProcessRole = ProcessRole::Worker { index: None };

    fn config_on(port: u16) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = port;
        config.health_probe.enabled = false;
        config
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tokio::test]
    async fn store_failure_never_binds() {
        let port = free_port();
        let store = Arc::new(FlakyStore {
            fail_init: true,
            ..FlakyStore::default()
        });

        let result = start_worker(config_on(port), Router::new(), store.clone(), STANDALONE, &Shutdown::new()).await;

        assert!(matches!(result, Err(StartupError::Store(_))));
        assert_eq!(store.closes.load(Ordering::SeqCst), 0);
        assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());
    }

    #[tokio::test]
    async fn bind_failure_releases_store() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let store = Arc::new(FlakyStore::default());

        let result = start_worker(config_on(port), Router::new(), store.clone(), STANDALONE, &Shutdown::new()).await;

        assert!(matches!(result, Err(StartupError::Listener(_))));
        assert_eq!(store.inits.load(Ordering::SeqCst), 1);
        assert_eq!(store.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_worker_exits_cleanly_after_trigger() {
        let store = Arc::new(FlakyStore::default());
        let shutdown = Shutdown::new();

        let worker = tokio::spawn(run_worker(
            config_on(0),
            Router::new(),
            store.clone(),
            STANDALONE,
            shutdown.clone(),
        ));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        shutdown.trigger();

        assert_eq!(worker.await.unwrap(), ExitOutcome::Clean);
        assert_eq!(store.closes.load(Ordering::SeqCst), 1);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn pool_members_share_the_port() {
        let shutdown = Shutdown::new();
        let first = start_worker(
            config_on(0),
            Router::new(),
            Arc::new(FlakyStore::default()),
            ProcessRole::Worker { index: Some(0) },
            &shutdown,
        )
        .await
        .unwrap();
        let port = first.local_addr().port();

        let second = start_worker(
            config_on(port),
            Router::new(),
            Arc::new(FlakyStore::default()),
            ProcessRole::Worker { index: Some(1) },
            &shutdown,
        )
        .await
        .expect("sibling worker binds the same port");
        assert_eq!(second.local_addr().port(), port);

        shutdown.trigger();
        assert_eq!(first.wait(&shutdown).await, ExitOutcome::Clean);
        assert_eq!(second.wait(&shutdown).await, ExitOutcome::Clean);
    }
}
