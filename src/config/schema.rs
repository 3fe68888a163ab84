//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults, so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DevTraceConfig {
    /// Store capacities.
    pub store: StoreConfig,

    /// Observer gateway listener.
    pub gateway: GatewayConfig,

    /// Which logging paths are captured.
    pub capture: CaptureConfig,

    /// Logging of devtrace itself.
    pub observability: ObservabilityConfig,
}

/// Bounded store capacities.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum retained traces; the oldest is evicted beyond this.
    pub max_traces: usize,

    /// Maximum retained log entries.
    pub max_logs: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_traces: 1000,
            max_logs: 5000,
        }
    }
}

/// Gateway listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address for the standalone gateway (e.g., "127.0.0.1:4318").
    pub bind_address: String,

    /// WebSocket upgrade path.
    pub ws_path: String,

    /// Liveness check path.
    pub health_path: String,

    /// Per-observer outbound queue length before it is considered slow.
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4318".to_string(),
            ws_path: "/ws".to_string(),
            health_path: "/health".to_string(),
            outbound_buffer: 256,
        }
    }
}

/// Log capture switches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Install the interceptor on the `DevTrace` console.
    pub console: bool,

    /// Capture `tracing` events through the capture layer.
    pub tracing: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            console: true,
            tracing: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
