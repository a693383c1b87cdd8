//! Network-backed store handle.
//!
//! # Responsibilities
//! - Establish one connection to the store at startup, bounded by a timeout
//! - Hold it for the life of the worker
//! - Shut it down cleanly on close

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::{BackingStore, StoreError};

pub struct TcpStore {
    address: String,
    connect_timeout: Duration,
    connection: Mutex<Option<TcpStream>>,
}

impl TcpStore {
    pub fn new(address: String, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            connection: Mutex::new(None),
        }
    }

    fn init_error(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Init {
            store: format!("{} ({})", self.name(), self.address),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BackingStore for TcpStore {
    fn name(&self) -> &str {
        "tcp"
    }

    async fn init(&self) -> Result<(), StoreError> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.init_error(e.to_string())),
            Err(_) => {
                return Err(self.init_error(format!(
                    "connect timed out after {:?}",
                    self.connect_timeout
                )))
            }
        };

        tracing::debug!(address = %self.address, "Store connection established");
        *self.connection.lock().await = Some(stream);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut stream = self.connection.lock().await.take().ok_or_else(|| StoreError::Close {
            store: self.name().to_string(),
            reason: "no open connection".to_string(),
        })?;

        stream.shutdown().await.map_err(|e| StoreError::Close {
            store: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}
