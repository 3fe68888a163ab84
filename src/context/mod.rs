//! Ambient trace context.
//!
//! # Data Flow
//! ```text
//! host begins a request
//!     → run_with_trace(trace_id, handler)
//!     → handler awaits, suspends, resumes (any depth)
//!     → current_trace_id() == trace_id everywhere inside
//! ```
//!
//! # Design Decisions
//! - The id is a tokio task-local, so it lives inside the future being
//!   polled rather than on a thread. Work that hops worker threads or
//!   interleaves with other requests still sees its own id.
//! - Nested extents shadow the outer id and restore it on exit.
//! - Spawned tasks start without an id; `spawn_traced` carries it over.

use std::future::Future;

use tokio::task::JoinHandle;

tokio::task_local! {
    static CURRENT_TRACE: String;
}

/// Run `future` with `trace_id` bound as the ambient trace id.
pub async fn run_with_trace<F>(trace_id: impl Into<String>, future: F) -> F::Output
where
    F: Future,
{
    CURRENT_TRACE.scope(trace_id.into(), future).await
}

/// Run a synchronous closure with `trace_id` bound as the ambient trace id.
pub fn run_with_trace_sync<R>(trace_id: impl Into<String>, f: impl FnOnce() -> R) -> R {
    CURRENT_TRACE.sync_scope(trace_id.into(), f)
}

/// The trace id bound to the currently executing unit of work, if any.
pub fn current_trace_id() -> Option<String> {
    CURRENT_TRACE.try_with(|id| id.clone()).ok()
}

/// Spawn a task that inherits the caller's ambient trace id.
pub fn spawn_traced<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current_trace_id() {
        Some(id) => tokio::spawn(CURRENT_TRACE.scope(id, future)),
        None => tokio::spawn(future),
    }
}
