//! Graceful shutdown against a live worker.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use prefork_server::cluster::ProcessRole;
use prefork_server::lifecycle::{run_worker, ExitOutcome, Shutdown, ShutdownState};
use tokio::net::TcpStream;

mod common;
use common::CountingStore;

#[tokio::test]
async fn in_flight_request_completes_during_drain() {
    let store = Arc::new(CountingStore::default());
    let (worker, shutdown) =
        common::start(common::test_config(), common::slow_routes(), store.clone()).await;
    let addr = worker.local_addr();

    let in_flight = tokio::spawn(common::client().get(common::url(addr, "/slow/1000")).send());
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(shutdown.trigger());
    let draining = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { worker.wait(&shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        TcpStream::connect(addr).await.is_err(),
        "new connections must be refused while draining"
    );
    assert_eq!(store.closes(), 0, "store stays open until draining finishes");

    let response = in_flight.await.unwrap().expect("in-flight request should complete");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"], "done");

    assert_eq!(draining.await.unwrap(), ExitOutcome::Clean);
    assert_eq!(store.closes(), 1);
    assert_eq!(shutdown.state(), ShutdownState::Closed);
}

#[tokio::test]
async fn repeated_triggers_close_store_once() {
    let store = Arc::new(CountingStore::default());
    let (worker, shutdown) = common::start(common::test_config(), Router::new(), store.clone()).await;

    let first = shutdown.trigger();
    let second = shutdown.trigger();
    assert!(first);
    assert!(!second);

    let outcome = worker.wait(&shutdown).await;
    assert!(!shutdown.trigger());

    assert_eq!(outcome, ExitOutcome::Clean);
    assert_eq!(outcome.code(), 0);
    assert_eq!(store.closes(), 1);
}

#[tokio::test]
async fn store_close_failure_exits_nonzero() {
    let store = Arc::new(CountingStore {
        fail_close: true,
        ..CountingStore::default()
    });
    let (worker, shutdown) = common::start(common::test_config(), Router::new(), store.clone()).await;

    shutdown.trigger();
    let outcome = worker.wait(&shutdown).await;

    assert_eq!(outcome, ExitOutcome::Failed);
    assert_eq!(outcome.code(), 1);
    assert_eq!(store.closes(), 1);
}

#[tokio::test]
async fn drain_timeout_is_a_close_error() {
    let store = Arc::new(CountingStore::default());
    let mut config = common::test_config();
    config.shutdown.drain_timeout_secs = Some(1);
    let (worker, shutdown) = common::start(config, common::slow_routes(), store.clone()).await;
    let addr = worker.local_addr();

    let _stuck = tokio::spawn(common::client().get(common::url(addr, "/slow/10000")).send());
    tokio::time::sleep(Duration::from_millis(200)).await;

    shutdown.trigger();
    let outcome = tokio::time::timeout(Duration::from_secs(5), worker.wait(&shutdown))
        .await
        .expect("drain should be bounded");

    assert_eq!(outcome, ExitOutcome::Failed);
    assert_eq!(store.closes(), 1, "store is still released after a drain timeout");
}

#[tokio::test]
async fn store_init_failure_never_serves() {
    let store = Arc::new(CountingStore {
        fail_init: true,
        ..CountingStore::default()
    });
    let shutdown = Shutdown::new();

    let outcome = run_worker(common::test_config(), Router::new(), store.clone(), ProcessRole::Worker { index: None }, shutdown).await;

    assert_eq!(outcome, ExitOutcome::Failed);
    assert_eq!(store.inits.load(Ordering::SeqCst), 1);
    assert_eq!(store.closes(), 0);
}
