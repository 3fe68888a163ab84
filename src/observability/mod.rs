//! Observability of devtrace itself.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, crate target)
//!     → metrics.rs (counters, gauges)
//!
//! logging.rs installs the process subscriber:
//!     EnvFilter → fmt layer (stdout)
//!               → CaptureLayer (application events into the log store)
//! ```
//!
//! # Design Decisions
//! - The crate's own events are never captured into the log store, so
//!   pushing a log entry cannot produce another log entry
//! - Metrics go through the `metrics` facade; the host picks the recorder

pub mod logging;
pub mod metrics;
