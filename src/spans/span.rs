//! Span and span event records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::clock::now_ms;

/// A timestamped point-in-time annotation on a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    /// Epoch milliseconds.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

/// A timed sub-operation within a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub id: String,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    /// Epoch milliseconds.
    pub start_time: f64,
    pub end_time: Option<f64>,
    /// `end_time - start_time`, set once on close.
    pub duration: Option<f64>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub events: Vec<SpanEvent>,
}

impl Span {
    pub(crate) fn open(name: &str, trace_id: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trace_id: trace_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            name: name.to_string(),
            start_time: now_ms(),
            end_time: None,
            duration: None,
            attributes: Map::new(),
            events: Vec::new(),
        }
    }

    /// Freeze timing. Returns false if the span was already closed.
    pub(crate) fn close(&mut self, at: f64) -> bool {
        if self.end_time.is_some() {
            return false;
        }
        let end = at.max(self.start_time);
        self.end_time = Some(end);
        self.duration = Some(end - self.start_time);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }
}
