//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Parent: fork workers → supervise
//!     Worker: store init → bind → serve → probe loop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger (first one wins)
//!
//! Shutdown (shutdown.rs):
//!     Draining → stop accept → drain in-flight → store close → Closed
//! ```
//!
//! # Design Decisions
//! - Ordered startup: store first, listener last (traffic only when ready)
//! - Ordered shutdown: stop accept, drain, close store
//! - Handler faults are contained per request and never start shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{coordinate, ExitOutcome, Shutdown, ShutdownListener, ShutdownState};
pub use signals::TermSignals;
pub use startup::{run_parent, run_worker, start_worker, RunningWorker, StartupError};
