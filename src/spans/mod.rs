//! Span lifecycle.
//!
//! # Data Flow
//! ```text
//! SpanHelper (bound to a trace id)
//!     → tracer.rs start_span (active table, keyed by span id)
//!     → set_attribute / add_event while open
//!     → tracer.rs end_span (freeze timing, leave active table)
//!     → TraceStore::add_span (append to the owning trace)
//! ```

pub mod helper;
pub mod span;
pub mod tracer;

pub use helper::SpanHelper;
pub use span::{Span, SpanEvent};
pub use tracer::SpanTracer;
