//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the Axum Router: application routes, liveness, catch-all
//! - Wire up middleware (request filter, panic containment, request ID, tracing)
//! - Serve HTTP/1.1 and HTTP/2 connections accepted by the bounded listener
//! - Stop accepting on shutdown and drain in-flight requests

use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, Uri},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto::Builder as ConnBuilder, graceful::GracefulShutdown},
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::health::{endpoint, Liveness};
use crate::http::filter::{request_filter, TimeoutPolicy};
use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::response::ApiResponse;
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::net::connection::OpenConnections;
use crate::net::Listener;
use crate::observability::metrics;

/// Errors reported while closing a listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("in-flight requests did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("server task failed: {0}")]
    Task(String),
}

/// HTTP server for one worker.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    connections: OpenConnections,
}

impl HttpServer {
    /// Create a server serving `routes` ahead of the core endpoints.
    ///
    /// The liveness path is reserved; `routes` must not register it.
    pub fn new(config: ServerConfig, routes: Router, liveness: Liveness) -> Self {
        let router = Self::build_router(&config, routes, liveness);
        Self {
            router,
            config,
            connections: OpenConnections::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The catch-all is registered after every other route so application
    /// routes always win.
    fn build_router(config: &ServerConfig, routes: Router, liveness: Liveness) -> Router {
        let policy = TimeoutPolicy {
            deadline: config.timeouts.request(),
            max_body_bytes: config.http.max_body_bytes,
        };

        routes
            .merge(endpoint::router(&config.http.health_path, liveness))
            .fallback(not_found)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn_with_state(policy, request_filter))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Start serving on `listener` until `shutdown` begins draining.
    pub fn start(self, listener: Listener, shutdown: &Shutdown) -> ServerHandle {
        let local_addr = listener.local_addr();
        tracing::info!(address = %local_addr, "HTTP server starting");

        let task = tokio::spawn(serve(
            self.router,
            listener,
            shutdown.subscribe(),
            self.connections,
            self.config.timeouts.server(),
            self.config.shutdown.drain_timeout(),
        )
        .in_current_span());

        ServerHandle { local_addr, task }
    }
}

/// A live listener owned by this process.
///
/// Closing consumes the handle, so a closed listener cannot be reused.
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<Result<(), ServerError>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the listener to stop accepting and finish draining.
    ///
    /// Resolves only after the shutdown it was started with has been triggered.
    pub async fn close(self) -> Result<(), ServerError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ServerError::Task(e.to_string())),
        }
    }
}

async fn serve(
    router: Router,
    listener: Listener,
    mut shutdown: ShutdownListener,
    connections: OpenConnections,
    server_timeout: Duration,
    drain_timeout: Option<Duration>,
) -> Result<(), ServerError> {
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(server_timeout);
    builder.http2().timer(TokioTimer::new());

    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            accepted = listener.accept() => {
                let (stream, peer_addr, permit) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                };

                let open = connections.open(peer_addr);

                let service = TowerToHyperService::new(router.clone());
                let connection = builder
                    .serve_connection_with_upgrades(TokioIo::new(stream), service)
                    .into_owned();
                let connection = graceful.watch(connection);

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = connection.await {
                        tracing::debug!(
                            peer_addr = %open.peer_addr(),
                            error = %e,
                            "Connection ended with error"
                        );
                    }
                });
            }
        }
    }

    // Stop accepting before waiting on in-flight work.
    drop(listener);
    tracing::info!(
        open_connections = connections.count(),
        "Listener closed, draining in-flight requests"
    );

    match drain_timeout {
        Some(limit) => {
            if tokio::time::timeout(limit, graceful.shutdown()).await.is_err() {
                tracing::error!(
                    open_connections = connections.count(),
                    limit = ?limit,
                    "Drain deadline passed with connections still open"
                );
                return Err(ServerError::DrainTimeout(limit));
            }
        }
        None => graceful.shutdown().await,
    }

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Catch-all for requests no route matched.
async fn not_found(method: Method, uri: Uri) -> ApiResponse {
    tracing::debug!(method = %method, path = %uri.path(), "No route matched");
    metrics::record_not_found();
    ApiResponse::not_found(format!("No route for {} {}", method, uri.path()))
}

/// Turns a handler panic into a `SERVER_ERROR` response; serving continues.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    tracing::error!(panic = %detail, "Request handler panicked");
    metrics::record_handler_panic();
    ApiResponse::server_error("Internal server error").into_response()
}
