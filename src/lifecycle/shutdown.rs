//! Shutdown coordination for a worker.
//!
//! # State Machine
//! ```text
//! Running --(SIGINT|SIGTERM)--> Draining --(store close returned)--> Closed
//! ```
//!
//! Only the first trigger moves the state; later triggers are no-ops.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::http::server::ServerHandle;
use crate::store::StoreGate;

/// Process shutdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Serving traffic.
    Running,
    /// No new connections; in-flight requests finishing.
    Draining,
    /// Listener and store released.
    Closed,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Running,
            1 => ShutdownState::Draining,
            _ => ShutdownState::Closed,
        }
    }
}

/// How the process should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Clean,
    Failed,
}

impl ExitOutcome {
    pub fn code(self) -> u8 {
        match self {
            ExitOutcome::Clean => 0,
            ExitOutcome::Failed => 1,
        }
    }
}

impl From<ExitOutcome> for std::process::ExitCode {
    fn from(outcome: ExitOutcome) -> Self {
        std::process::ExitCode::from(outcome.code())
    }
}

/// Coordinator for graceful shutdown.
///
/// Cloneable; all clones share one state and one broadcast channel that
/// long-running tasks subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    state: Arc<AtomicU8>,
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator in the `Running` state.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            state: Arc::new(AtomicU8::new(0)),
            tx,
        }
    }

    /// Subscribe to the start of draining.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            state: Arc::clone(&self.state),
            rx: self.tx.subscribe(),
        }
    }

    /// Request shutdown.
    ///
    /// Returns `true` only for the call that moved `Running` to `Draining`.
    pub fn trigger(&self) -> bool {
        let moved = self
            .state
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if moved {
            let _ = self.tx.send(());
        }
        moved
    }

    /// Current state.
    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Record that teardown finished.
    pub fn mark_closed(&self) {
        self.state.store(2, Ordering::SeqCst);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for the coordinator to leave `Running`.
#[derive(Debug)]
pub struct ShutdownListener {
    state: Arc<AtomicU8>,
    rx: broadcast::Receiver<()>,
}

impl ShutdownListener {
    /// Resolve once draining has started, immediately if it already has.
    pub async fn recv(&mut self) {
        if self.state.load(Ordering::SeqCst) != 0 {
            return;
        }
        // A closed or lagged channel also means the trigger fired.
        let _ = self.rx.recv().await;
    }
}

/// Drive a worker from `Draining` to `Closed`.
///
/// Waits for the trigger, closes the listener (stop accepting, drain
/// in-flight requests), then closes the store exactly once.
pub async fn coordinate(shutdown: &Shutdown, server: ServerHandle, store: StoreGate) -> ExitOutcome {
    shutdown.subscribe().recv().await;
    tracing::info!("Draining: no longer accepting connections");

    let server_ok = match server.close().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Listener close reported an error");
            false
        }
    };

    let store_ok = store.close().await.is_ok();
    shutdown.mark_closed();

    let outcome = if server_ok && store_ok {
        ExitOutcome::Clean
    } else {
        ExitOutcome::Failed
    };
    tracing::info!(exit_code = outcome.code(), "Shutdown complete");
    outcome
}
