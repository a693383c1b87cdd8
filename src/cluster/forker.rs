//! Worker spawning.
//!
//! # Responsibilities
//! - Start N worker processes running the same startup logic as the parent
//! - Keep going when an individual spawn fails
//!
//! # Design Decisions
//! - Workers re-execute the current binary with the parent's arguments
//! - The worker index travels in `PREFORK_WORKER_INDEX`
//! - No rollback: a partially started pool still serves

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};

use super::role::WORKER_INDEX_ENV;

/// Creates one worker process.
pub trait WorkerSpawner {
    type Worker;

    fn spawn(&self, index: usize) -> io::Result<Self::Worker>;
}

/// Spawns workers by executing a program with fixed arguments.
#[derive(Debug, Clone)]
pub struct ExecSpawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExecSpawner {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-execute the running binary with the arguments it was started with.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, std::env::args_os().skip(1)))
    }
}

impl WorkerSpawner for ExecSpawner {
    type Worker = Child;

    fn spawn(&self, index: usize) -> io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .env(WORKER_INDEX_ENV, index.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .spawn()
    }
}

/// Spawn `count` workers, returning those that started with their index.
pub fn fork_workers<S: WorkerSpawner>(spawner: &S, count: usize) -> Vec<(usize, S::Worker)> {
    let mut workers = Vec::with_capacity(count);

    for index in 0..count {
        match spawner.spawn(index) {
            Ok(worker) => {
                tracing::info!(worker = index, "Worker spawned");
                workers.push((index, worker));
            }
            Err(e) => {
                tracing::error!(worker = index, error = %e, "Failed to spawn worker");
            }
        }
    }

    if workers.len() < count {
        tracing::warn!(
            requested = count,
            started = workers.len(),
            "Worker pool running below requested size"
        );
    }
    workers
}
