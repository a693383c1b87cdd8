//! Startup self-probing.
//!
//! # Responsibilities
//! - Periodically request the process's own liveness endpoint
//! - Log every outcome
//! - Stop for good once the probe window has elapsed
//!
//! # Design Decisions
//! - A failed probe is logged and counted, never escalated
//! - At most `ceil(window / interval)` attempts
//! - Runs on its own task and shares nothing with request serving

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthProbeConfig;
use crate::lifecycle::shutdown::ShutdownListener;
use crate::observability::metrics;

/// Largest probe response body that gets logged.
const MAX_PROBE_BODY: usize = 16 * 1024;

/// Why a single probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe request: {0}")]
    Build(String),

    #[error("probe request failed: {0}")]
    Request(String),

    #[error("probe returned status {0}")]
    Status(u16),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// One liveness check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform the check and return the response payload.
    async fn probe(&self) -> Result<String, ProbeError>;
}

/// Probes an HTTP endpoint on the local host.
pub struct HttpProbe {
    client: Client<HttpConnector, String>,
    uri: String,
    timeout: Duration,
}

impl HttpProbe {
    /// Probe `path` on the listener bound at `local_addr`.
    ///
    /// Wildcard bind addresses are probed through loopback.
    pub fn new(local_addr: SocketAddr, path: &str, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let target = probe_target(local_addr);

        Self {
            client,
            uri: format!("http://{}{}", target, path),
            timeout,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

fn probe_target(local_addr: SocketAddr) -> SocketAddr {
    let ip = match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local_addr.port())
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self) -> Result<String, ProbeError> {
        let request = Request::builder()
            .method("GET")
            .uri(&self.uri)
            .header("user-agent", "prefork-health-probe")
            .body(String::new())
            .map_err(|e| ProbeError::Build(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| ProbeError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProbeError::Status(status.as_u16()));
            }

            let bytes = to_bytes(Body::new(response.into_body()), MAX_PROBE_BODY)
                .await
                .map_err(|e| ProbeError::Request(e.to_string()))?;
            Ok::<_, ProbeError>(String::from_utf8_lossy(&bytes).into_owned())
        };

        time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}

/// Progress of the probe loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthProbeState {
    pub ticks_elapsed: u32,
    pub window_expired: bool,
}

/// Bounded probe loop.
pub struct HealthProbe<P> {
    probe: P,
    interval: Duration,
    window: Duration,
    max_attempts: u32,
}

impl<P: Probe> HealthProbe<P> {
    pub fn new(config: &HealthProbeConfig, probe: P) -> Self {
        Self {
            probe,
            interval: config.interval(),
            window: config.window(),
            max_attempts: config.max_attempts(),
        }
    }

    /// Run until the window expires or the process starts draining.
    pub async fn run(self, mut shutdown: ShutdownListener) -> HealthProbeState {
        let mut state = HealthProbeState::default();
        if self.max_attempts == 0 {
            state.window_expired = true;
            return state;
        }

        tracing::info!(
            interval = ?self.interval,
            window = ?self.window,
            max_attempts = self.max_attempts,
            "Health probe starting"
        );

        let start = Instant::now();
        let mut ticker = time::interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let window_end = time::sleep_until(start + self.window);
        tokio::pin!(window_end);

        loop {
            if state.ticks_elapsed >= self.max_attempts {
                state.window_expired = true;
                break;
            }

            tokio::select! {
                biased;
                _ = &mut window_end => {
                    state.window_expired = true;
                    break;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health probe received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    state.ticks_elapsed += 1;
                    self.probe_once(state.ticks_elapsed).await;
                }
            }
        }

        if state.window_expired {
            tracing::info!(attempts = state.ticks_elapsed, "Health probe window elapsed, stopping");
        }
        state
    }

    async fn probe_once(&self, attempt: u32) {
        match self.probe.probe().await {
            Ok(payload) => {
                match answering_pid(&payload) {
                    Some(pid) if pid != std::process::id() => tracing::info!(
                        attempt,
                        answered_by = pid,
                        payload = %payload,
                        "Health probe answered by a sibling worker on the shared port"
                    ),
                    _ => tracing::info!(attempt, payload = %payload, "Health probe succeeded"),
                }
                metrics::record_probe(true);
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Health probe failed");
                metrics::record_probe(false);
            }
        }
    }
}

/// Process id reported by a liveness payload.
///
/// Pool members share one port, so the kernel may route a self-probe to a
/// sibling; the pid tells the two apart.
fn answering_pid(payload: &str) -> Option<u32> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let pid = value.get("data")?.get("pid")?.as_u64()?;
    u32::try_from(pid).ok()
}
