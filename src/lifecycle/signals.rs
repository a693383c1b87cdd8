//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate every received signal into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM and SIGINT behave identically
//! - Signals after the first are logged and otherwise ignored

use std::io;

use crate::lifecycle::shutdown::Shutdown;

/// A termination signal the process honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for TermSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermSignal::Interrupt => write!(f, "SIGINT"),
            TermSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Stream of termination signals.
pub struct TermSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl TermSignals {
    /// Install handlers for SIGINT and SIGTERM.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sigint: signal(SignalKind::interrupt())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next termination signal.
    pub async fn next(&mut self) -> TermSignal {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.sigterm.recv() => TermSignal::Terminate,
                _ = self.sigint.recv() => TermSignal::Interrupt,
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            TermSignal::Interrupt
        }
    }
}

/// Trigger `shutdown` on every termination signal until the process exits.
pub async fn listen(mut signals: TermSignals, shutdown: Shutdown) {
    loop {
        let signal = signals.next().await;
        if shutdown.trigger() {
            tracing::info!(signal = %signal, "Shutdown signal received");
        } else {
            tracing::info!(signal = %signal, state = ?shutdown.state(), "Shutdown already in progress, ignoring signal");
        }
    }
}
