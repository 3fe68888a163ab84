//! Span lifecycle tracking.
//!
//! Open spans live in an id-keyed table so instrumentation can refer to them
//! across suspension points without holding a reference.

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::clock::now_ms;
use crate::spans::span::{Span, SpanEvent};

/// Active-span table.
#[derive(Debug, Default)]
pub struct SpanTracer {
    active: DashMap<String, Span>,
}

impl SpanTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a span and register it as active. Returns a snapshot.
    pub fn start_span(&self, name: &str, trace_id: &str, parent_id: Option<&str>) -> Span {
        let span = Span::open(name, trace_id, parent_id);
        tracing::trace!(span_id = %span.id, trace_id = %trace_id, name = %name, "Span opened");
        self.active.insert(span.id.clone(), span.clone());
        span
    }

    /// Set or overwrite an attribute. No-op if the span is closed or unknown.
    pub fn set_attribute(&self, span_id: &str, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(mut span) = self.active.get_mut(span_id) {
            span.attributes.insert(key.into(), value.into());
        }
    }

    /// Append a timestamped event. No-op if the span is closed or unknown.
    pub fn add_event(&self, span_id: &str, name: impl Into<String>, attributes: Option<Map<String, Value>>) {
        if let Some(mut span) = self.active.get_mut(span_id) {
            span.events.push(SpanEvent {
                name: name.into(),
                timestamp: now_ms(),
                attributes: attributes.unwrap_or_default(),
            });
        }
    }

    /// Close an open span. Returns `None` if it was already closed or never existed.
    pub fn end_span(&self, span_id: &str) -> Option<Span> {
        let (_, mut span) = self.active.remove(span_id)?;
        span.close(now_ms());
        tracing::trace!(
            span_id = %span.id,
            trace_id = %span.trace_id,
            duration_ms = span.duration.unwrap_or_default(),
            "Span closed"
        );
        Some(span)
    }

    /// Snapshot of an open span.
    pub fn get_active(&self, span_id: &str) -> Option<Span> {
        self.active.get(span_id).map(|r| r.value().clone())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
