//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Liveness endpoint (endpoint.rs):
//!     GET /health → SUCCESS {status, pid, worker, uptime_secs}
//!
//! Self-probe loop (probe.rs):
//!     Listener live
//!     → every interval: GET own /health, log outcome
//!     → stop permanently once the window elapses
//! ```
//!
//! # Design Decisions
//! - The probe loop verifies startup; it is not a perpetual monitor
//! - Probe failures never affect serving or shutdown

pub mod endpoint;
pub mod probe;

pub use endpoint::Liveness;
pub use probe::{HealthProbe, HealthProbeState, HttpProbe, Probe, ProbeError};
