//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     role.rs decides Parent or Worker (once, immutable)
//!
//! Parent (workers > 0, no marker):
//!     forker.rs spawns N copies of this binary
//!     → supervisor.rs waits, forwards SIGTERM, reports outcome
//!
//! Worker:
//!     lifecycle::startup runs store → listener → probe → shutdown
//! ```
//!
//! # Design Decisions
//! - Each worker is an independent process and failure domain
//! - The parent never binds a listener
//! - Workers bind their own sockets with SO_REUSEPORT

pub mod forker;
pub mod role;
pub mod supervisor;

pub use forker::{fork_workers, ExecSpawner, WorkerSpawner};
pub use role::{ProcessRole, WORKER_INDEX_ENV};
pub use supervisor::supervise;
