//! Log capture.
//!
//! # Data Flow
//! ```text
//! Console::info(args) ──┐                 tracing::info!(..) ──→ layer.rs
//!   → sink slot         │                                          │
//!   → CapturingSink     │                                          │
//!       → prior sink (runs first, unchanged output)                │
//!       → LogCapture::record ←─────────────────────────────────────┘
//!           → flatten args, stack from first error (error level)
//!           → ambient trace id → copy of trace metadata
//!           → LogStore::add_log
//!           → TraceStore::append_log (when a trace is ambient)
//!           → listener (gateway push)
//! ```
//!
//! # Design Decisions
//! - The interceptor owns the console's sink slot while installed and keeps
//!   the exact prior sink for restore
//! - Context is copied into the entry, so entries outlive evicted traces

pub mod interceptor;
pub mod layer;
pub mod sink;

pub use interceptor::{ConsoleInterceptor, LogCapture, LogListener};
pub use layer::{without_capture, without_capture_sync, CaptureLayer};
pub use sink::{flatten_message, Console, LogArg, LogSink, SinkHandle, StdioSink};
