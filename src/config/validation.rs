//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities > 0, buffer > 0)
//! - Check addresses and route paths are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DevTraceConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::DevTraceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
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

pub fn validate_config(config: &DevTraceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.store.max_traces == 0 {
        errors.push(ValidationError::new("store.max_traces", "must be greater than 0"));
    }
    if config.store.max_logs == 0 {
        errors.push(ValidationError::new("store.max_logs", "must be greater than 0"));
    }
    if config.gateway.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "gateway.bind_address",
            format!("'{}' is not a socket address", config.gateway.bind_address),
        ));
    }
    if !config.gateway.ws_path.starts_with('/') {
        errors.push(ValidationError::new("gateway.ws_path", "must start with '/'"));
    }
    if !config.gateway.health_path.starts_with('/') {
        errors.push(ValidationError::new("gateway.health_path", "must start with '/'"));
    }
    if config.gateway.ws_path == config.gateway.health_path {
        errors.push(ValidationError::new("gateway.health_path", "must differ from ws_path"));
    }
    if config.gateway.outbound_buffer == 0 {
        errors.push(ValidationError::new("gateway.outbound_buffer", "must be greater than 0"));
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
