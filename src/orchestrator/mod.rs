//! Wiring of the observability core behind one host API.
//!
//! # Data Flow
//! ```text
//! host request → create_trace → run_with_trace(id, handler)
//!     handler logs   → LogCapture → LogStore + trace.logs → "log.entry"
//!     handler spans  → SpanHelper → SpanTracer → trace.spans
//! host response → complete_trace → "trace.new"
//! ```
//!
//! Each [`DevTrace`] owns its stores, so several instances never share state.

pub mod devtrace;

pub use devtrace::{events, DevTrace, OutputStream};
