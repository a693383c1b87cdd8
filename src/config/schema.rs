//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a worker process.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (host, port, connection limits).
    pub listener: ListenerConfig,

    /// Worker pool topology.
    pub cluster: ClusterConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// HTTP surface owned by the core (liveness path, body limits).
    pub http: HttpConfig,

    /// Startup self-verification loop.
    pub health_probe: HealthProbeConfig,

    /// Drain behavior on termination.
    pub shutdown: ShutdownConfig,

    /// Backing store connection.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// URL printed at startup so operators can check liveness by hand.
    pub fn health_check_url(&self) -> String {
        let base = self
            .listener
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.listener.port));
        format!("{}{}", base.trim_end_matches('/'), self.http.health_path)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind. Zero asks the OS for a free port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Pending connection queue length passed to `listen(2)`.
    pub backlog: u32,

    /// Public base URL, used only for the startup health-check message.
    pub public_url: Option<String>,
}

impl ListenerConfig {
    /// The `host:port` pair to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
            backlog: 1024,
            public_url: None,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of worker processes to fork. Zero serves from the original process.
    pub workers: usize,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in seconds.
    pub request_secs: u64,

    /// Connection-level read timeout (request headers) in seconds.
    pub server_secs: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn server(&self) -> Duration {
        Duration::from_secs(self.server_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            server_secs: 60,
        }
    }
}

/// Core HTTP surface settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Path of the liveness endpoint.
    pub health_path: String,

    /// Maximum structured body size buffered for validation.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            health_path: "/health".to_string(),
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Health probe loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthProbeConfig {
    /// Run the probe loop after startup.
    pub enabled: bool,

    /// Seconds between probes.
    pub interval_secs: u64,

    /// Total seconds the loop is allowed to run.
    pub window_secs: u64,

    /// Per-probe request timeout in seconds.
    pub timeout_secs: u64,
}

impl HealthProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Upper bound on probe attempts: `ceil(window / interval)`.
    pub fn max_attempts(&self) -> u32 {
        if self.interval_secs == 0 {
            return 0;
        }
        let attempts = self.window_secs.div_ceil(self.interval_secs);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            window_secs: 300,
            timeout_secs: 5,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound on waiting for in-flight requests. Unset waits indefinitely.
    pub drain_timeout_secs: Option<u64>,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_secs.map(Duration::from_secs)
    }
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store address (`host:port`). Unset uses the in-process memory store.
    pub address: Option<String>,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: None,
            connect_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address. Workers offset the port by their index.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_attempts_round_up() {
        let mut probe = HealthProbeConfig::default();
        assert_eq!(probe.max_attempts(), 30);

        probe.window_secs = 25;
        assert_eq!(probe.max_attempts(), 3);

        probe.interval_secs = 0;
        assert_eq!(probe.max_attempts(), 0);
    }

    #[test]
    fn health_url_prefers_public_url() {
        let mut config = ServerConfig::default();
        assert_eq!(config.health_check_url(), "http://localhost:8080/health");

        config.listener.public_url = Some("https://api.example.com/v1/".into());
        assert_eq!(config.health_check_url(), "https://api.example.com/v1/health");
    }
}
