//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::get, Router};
use prefork_server::cluster::ProcessRole;
use prefork_server::config::ServerConfig;
use prefork_server::http::ApiResponse;
use prefork_server::lifecycle::{start_worker, RunningWorker, Shutdown};
use prefork_server::store::{BackingStore, StoreError};

/// Store that counts lifecycle calls and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    pub inits: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_init: bool,
    pub fail_close: bool,
}

impl CountingStore {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackingStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(StoreError::Init {
                store: "counting".into(),
                reason: "refused".into(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(StoreError::Close {
                store: "counting".into(),
                reason: "flush failed".into(),
            });
        }
        Ok(())
    }
}

/// Loopback config on an OS-assigned port with the probe loop off.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.health_probe.enabled = false;
    config
}

/// Routes with a handler that takes `millis` to answer.
pub fn slow_routes() -> Router {
    Router::new().route(
        "/slow/{millis}",
        get(|axum::extract::Path(millis): axum::extract::Path<u64>| async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            ApiResponse::success(serde_json::json!("done"))
        }),
    )
}

/// Start a worker and return it with its shutdown handle.
pub async fn start(
    config: ServerConfig,
    routes: Router,
    store: Arc<CountingStore>,
) -> (RunningWorker, Shutdown) {
    let shutdown = Shutdown::new();
    let worker = start_worker(config, routes, store, ProcessRole::Worker { index: None }, &shutdown)
        .await
        .expect("worker should start");
    (worker, shutdown)
}

/// Client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}
