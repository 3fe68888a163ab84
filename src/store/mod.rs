//! Bounded in-memory storage for traces and logs.
//!
//! # Data Flow
//! ```text
//! host createTrace ──→ traces.rs (ring of Trace)
//!                          ↑ add_span / complete / add_context / append_log
//! spans::SpanHelper ───────┘
//!
//! console capture ──→ logs.rs (ring of LogEntry)
//!
//! rpc methods ──→ get_traces / get_logs / export / clear
//! ```
//!
//! # Design Decisions
//! - Both stores are strict FIFO rings (ring.rs); reads never reorder
//! - Unknown ids are no-ops, since eviction can race instrumentation
//! - Each mutation is one lock acquisition with no await inside
//! - Stores are plain values shared via Arc, one instance per `DevTrace`

pub mod logs;
pub mod ring;
pub mod traces;

pub use logs::{LogDraft, LogEntry, LogLevel, LogQuery, LogStore};
pub use ring::BoundedRing;
pub use traces::{ExportFormat, Trace, TraceQuery, TraceStore};
