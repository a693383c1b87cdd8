//! Parent-side supervision of the worker pool.
//!
//! # Responsibilities
//! - Wait for every worker and log how it exited
//! - Forward termination to live workers when the parent is signalled
//! - Report an exit outcome for the parent
//!
//! # Design Decisions
//! - Exited workers are not respawned
//! - Workers already handle SIGINT/SIGTERM idempotently, so a worker that
//!   receives both the terminal's signal and the forwarded one drains once

use std::collections::HashMap;

use tokio::process::Child;
use tokio::task::JoinSet;

use crate::lifecycle::shutdown::{ExitOutcome, Shutdown};

/// Supervise spawned workers until all of them have exited.
///
/// The outcome is clean only if at least one worker ran and every worker
/// exited successfully.
pub async fn supervise(workers: Vec<(usize, Child)>, shutdown: Shutdown) -> ExitOutcome {
    let mut live: HashMap<usize, u32> = HashMap::new();
    let mut set = JoinSet::new();

    for (index, mut child) in workers {
        if let Some(pid) = child.id() {
            live.insert(index, pid);
        }
        set.spawn(async move { (index, child.wait().await) });
    }

    if set.is_empty() {
        tracing::error!("No workers running, parent exiting");
        return ExitOutcome::Failed;
    }

    tracing::info!(workers = set.len(), "Supervising worker pool");

    let mut clean = true;
    let mut forwarded = false;
    let mut listener = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = listener.recv(), if !forwarded => {
                forwarded = true;
                tracing::info!(workers = live.len(), "Forwarding termination to workers");
                for (index, pid) in &live {
                    terminate(*index, *pid);
                }
            }
            joined = set.join_next() => {
                let Some(joined) = joined else { break };
                match joined {
                    Ok((index, Ok(status))) => {
                        live.remove(&index);
                        if status.success() {
                            tracing::info!(worker = index, "Worker exited cleanly");
                        } else {
                            clean = false;
                            tracing::warn!(worker = index, status = %status, "Worker exited with failure");
                        }
                    }
                    Ok((index, Err(e))) => {
                        live.remove(&index);
                        clean = false;
                        tracing::error!(worker = index, error = %e, "Failed to wait for worker");
                    }
                    Err(e) => {
                        clean = false;
                        tracing::error!(error = %e, "Worker wait task failed");
                    }
                }
            }
        }
    }

    shutdown.mark_closed();
    tracing::info!(clean, "All workers exited");
    if clean {
        ExitOutcome::Clean
    } else {
        ExitOutcome::Failed
    }
}

#[cfg(unix)]
fn terminate(index: usize, pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        tracing::warn!(worker = index, pid, "Worker pid out of range");
        return;
    };

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => tracing::debug!(worker = index, pid, "Sent SIGTERM"),
        // Already gone; its exit is collected by the wait task.
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(worker = index, pid, error = ?e, "Failed to signal worker"),
    }
}

#[cfg(not(unix))]
fn terminate(index: usize, pid: u32) {
    tracing::warn!(worker = index, pid, "Signal forwarding is unsupported on this platform");
}
