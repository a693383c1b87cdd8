//! Process role detection.

/// Environment variable marking a spawned worker and carrying its index.
pub const WORKER_INDEX_ENV: &str = "PREFORK_WORKER_INDEX";

/// What this process does for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// Original process supervising forked workers. Binds no listener.
    Parent,
    /// Process serving a listener; `index` is set for pool members.
    Worker { index: Option<usize> },
}

impl ProcessRole {
    /// Determine the role from the configured worker count and the environment.
    pub fn detect(workers: usize) -> Self {
        Self::from_marker(workers, std::env::var(WORKER_INDEX_ENV).ok().as_deref())
    }

    /// Determine the role from the configured worker count and a worker marker.
    pub fn from_marker(workers: usize, marker: Option<&str>) -> Self {
        if let Some(raw) = marker {
            match raw.parse::<usize>() {
                Ok(index) => return ProcessRole::Worker { index: Some(index) },
                Err(_) => {
                    tracing::warn!(value = raw, "Ignoring malformed {}", WORKER_INDEX_ENV);
                }
            }
        }

        if workers > 0 {
            ProcessRole::Parent
        } else {
            ProcessRole::Worker { index: None }
        }
    }

    pub fn worker_index(&self) -> Option<usize> {
        match self {
            ProcessRole::Worker { index } => *index,
            ProcessRole::Parent => None,
        }
    }

    /// Sibling workers share a port and need `SO_REUSEPORT`.
    pub fn shares_port(&self) -> bool {
        self.worker_index().is_some()
    }
}

impl std::fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessRole::Parent => write!(f, "parent"),
            ProcessRole::Worker { index: Some(i) } => write!(f, "worker-{}", i),
            ProcessRole::Worker { index: None } => write!(f, "worker"),
        }
    }
}
