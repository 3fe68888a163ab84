//! Span helper bound to a single trace.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Map, Value};

use crate::spans::span::Span;
use crate::spans::tracer::SpanTracer;
use crate::store::TraceStore;

/// Opens spans on one trace and appends them to it when they close.
#[derive(Debug, Clone)]
pub struct SpanHelper {
    trace_id: String,
    tracer: Arc<SpanTracer>,
    traces: Arc<TraceStore>,
}

impl SpanHelper {
    pub fn new(trace_id: impl Into<String>, tracer: Arc<SpanTracer>, traces: Arc<TraceStore>) -> Self {
        Self {
            trace_id: trace_id.into(),
            tracer,
            traces,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn start(&self, name: &str, parent_id: Option<&str>) -> Span {
        self.tracer.start_span(name, &self.trace_id, parent_id)
    }

    pub fn set_attribute(&self, span_id: &str, key: impl Into<String>, value: impl Into<Value>) {
        self.tracer.set_attribute(span_id, key, value);
    }

    pub fn add_event(&self, span_id: &str, name: impl Into<String>, attributes: Option<Map<String, Value>>) {
        self.tracer.add_event(span_id, name, attributes);
    }

    /// Close the span and append it to the trace it was opened on. `None`
    /// if already closed.
    pub fn end(&self, span_id: &str) -> Option<Span> {
        let span = self.tracer.end_span(span_id)?;
        if !self.traces.add_span(&span.trace_id, span.clone()) {
            tracing::debug!(trace_id = %span.trace_id, span_id = %span_id, "Span closed after its trace was evicted");
        }
        Some(span)
    }

    /// Run a fallible future inside a span.
    ///
    /// The span always closes. An `Err` or a panic is recorded on the span
    /// first, then handed back to the caller unchanged.
    pub async fn run<F, T, E>(&self, name: &str, parent_id: Option<&str>, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let span = self.start(name, parent_id);
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => {
                self.end(&span.id);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.fail(&span.id, &err.to_string());
                Err(err)
            }
            Err(panic) => {
                self.fail(&span.id, &panic_message(panic.as_ref()));
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Run an infallible future inside a span.
    pub async fn measure<F: Future>(&self, name: &str, parent_id: Option<&str>, future: F) -> F::Output {
        let span = self.start(name, parent_id);
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(value) => {
                self.end(&span.id);
                value
            }
            Err(panic) => {
                self.fail(&span.id, &panic_message(panic.as_ref()));
                std::panic::resume_unwind(panic)
            }
        }
    }

    fn fail(&self, span_id: &str, message: &str) {
        self.tracer.set_attribute(span_id, "error", true);
        self.tracer.set_attribute(span_id, "error.message", message);
        self.end(span_id);
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
