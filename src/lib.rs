//! In-process observability core for request-serving applications.
//!
//! Captures request traces, timed spans and log lines, keeps them in bounded
//! stores, and pushes them to dashboard observers over a WebSocket gateway
//! that also answers query methods.

pub mod clock;
pub mod config;
pub mod console;
pub mod context;
pub mod gateway;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod rpc;
pub mod spans;
pub mod store;

pub use config::DevTraceConfig;
pub use context::{current_trace_id, run_with_trace, spawn_traced};
pub use lifecycle::Shutdown;
pub use orchestrator::{DevTrace, OutputStream};
