//! Open-connection accounting.
//!
//! The accept loop opens one [`OpenConnection`] per accepted socket and the
//! connection task holds it until hyper is done with the socket. Draining
//! reads the count to report how many connections it is still waiting on.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Number of connections currently served by this worker.
#[derive(Debug, Clone, Default)]
pub struct OpenConnections {
    count: Arc<AtomicU64>,
}

impl OpenConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly accepted connection until the returned value is dropped.
    pub fn open(&self, peer_addr: SocketAddr) -> OpenConnection {
        let now = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_open_connections(now);
        OpenConnection {
            count: Arc::clone(&self.count),
            peer_addr,
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// One served connection; closing is recorded on drop.
#[derive(Debug)]
pub struct OpenConnection {
    count: Arc<AtomicU64>,
    peer_addr: SocketAddr,
}

impl OpenConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        let remaining = self.count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_open_connections(remaining);
        tracing::trace!(peer_addr = %self.peer_addr, remaining, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn counts_until_dropped() {
        let open = OpenConnections::new();
        assert_eq!(open.count(), 0);

        let a = open.open(peer(1000));
        let b = open.clone().open(peer(1001));
        assert_eq!(open.count(), 2);
        assert_eq!(b.peer_addr(), peer(1001));

        drop(a);
        assert_eq!(open.count(), 1);
        drop(b);
        assert_eq!(open.count(), 0);
    }
}
