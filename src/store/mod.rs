//! Backing-store lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Worker startup:
//!     StoreGate::init(store)  → BackingStore::init (exactly once)
//!     → gate threaded into the shutdown coordinator
//!
//! Worker shutdown:
//!     StoreGate::close()      → BackingStore::close (at most once)
//! ```
//!
//! # Design Decisions
//! - The store is an explicitly owned object, never ambient global state
//! - Holding a `StoreGate` proves initialization succeeded
//! - Close is idempotent at the gate; the store itself sees one call

pub mod memory;
pub mod tcp;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StoreConfig;

pub use memory::MemoryStore;
pub use tcp::TcpStore;

/// Errors reported by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store '{store}' failed to initialize: {reason}")]
    Init { store: String, reason: String },

    #[error("store '{store}' failed to close: {reason}")]
    Close { store: String, reason: String },
}

/// Lifecycle contract of the persistence layer.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Establish the store. Called once per process.
    async fn init(&self) -> Result<(), StoreError>;

    /// Release the store. Called at most once per process.
    async fn close(&self) -> Result<(), StoreError>;
}

/// An initialized backing store with a once-only close.
#[derive(Clone)]
pub struct StoreGate {
    store: Arc<dyn BackingStore>,
    closed: Arc<AtomicBool>,
}

impl StoreGate {
    /// Initialize the store and return the gate guarding it.
    pub async fn init(store: Arc<dyn BackingStore>) -> Result<Self, StoreError> {
        tracing::info!(store = store.name(), "Initializing backing store");
        store.init().await?;
        tracing::info!(store = store.name(), "Backing store ready");

        Ok(Self {
            store,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Close the store. Only the first call reaches the store.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(store = self.store.name(), "Backing store already closed");
            return Ok(());
        }

        match self.store.close().await {
            Ok(()) => {
                tracing::info!(store = self.store.name(), "Backing store closed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(store = self.store.name(), error = %e, "Backing store close failed");
                Err(e)
            }
        }
    }

    /// Whether close has been requested.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }
}

/// Build the store selected by configuration.
pub fn from_config(config: &StoreConfig) -> Arc<dyn BackingStore> {
    match &config.address {
        Some(address) => Arc::new(TcpStore::new(address.clone(), config.connect_timeout())),
        None => Arc::new(MemoryStore::new()),
    }
}
