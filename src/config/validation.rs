//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that URLs and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if let Some(public_url) = &config.listener.public_url {
        if let Err(e) = url::Url::parse(public_url) {
            errors.push(ValidationError::new(
                "listener.public_url",
                format!("invalid URL '{}': {}", public_url, e),
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.server_secs == 0 {
        errors.push(ValidationError::new("timeouts.server_secs", "must be greater than 0"));
    }

    if !config.http.health_path.starts_with('/') {
        errors.push(ValidationError::new("http.health_path", "must start with '/'"));
    }
    if config.http.max_body_bytes == 0 {
        errors.push(ValidationError::new("http.max_body_bytes", "must be greater than 0"));
    }

    let probe = &config.health_probe;
    if probe.enabled {
        if probe.interval_secs == 0 {
            errors.push(ValidationError::new("health_probe.interval_secs", "must be greater than 0"));
        }
        if probe.window_secs < probe.interval_secs {
            errors.push(ValidationError::new(
                "health_probe.window_secs",
                "must be at least one interval",
            ));
        }
        if probe.timeout_secs == 0 {
            errors.push(ValidationError::new("health_probe.timeout_secs", "must be greater than 0"));
        }
    }

    if let Some(address) = &config.store.address {
        if address.trim().is_empty() {
            errors.push(ValidationError::new("store.address", "must not be empty when set"));
        }
    }
    if config.store.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("store.connect_timeout_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ServerConfig::default();
        config.timeouts.request_secs = 0;
        config.http.health_path = "health".into();
        config.listener.public_url = Some("not a url".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.public_url", "timeouts.request_secs", "http.health_path"]
        );
    }

    #[test]
    fn disabled_probe_skips_probe_checks() {
        let mut config = ServerConfig::default();
        config.health_probe.enabled = false;
        config.health_probe.interval_secs = 0;
        assert!(validate_config(&config).is_ok());
    }
}
