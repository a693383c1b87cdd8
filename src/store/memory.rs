//! In-process store used when no external address is configured.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{BackingStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    open: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Close {
                store: self.name().to_string(),
                reason: "store was not open".to_string(),
            });
        }
        Ok(())
    }
}
