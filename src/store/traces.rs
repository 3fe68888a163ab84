//! Bounded trace collection.

use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::clock::now_millis;
use crate::observability::metrics;
use crate::spans::Span;
use crate::store::logs::LogEntry;
use crate::store::ring::BoundedRing;

/// The record of one top-level unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub id: String,
    /// Epoch milliseconds.
    pub created_at: u64,
    pub method: String,
    pub path: String,
    pub status_code: Option<u16>,
    /// Milliseconds, as reported by the host on completion.
    pub duration: Option<f64>,
    /// Closed spans in the order they ended.
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Log entries emitted while this trace was ambient.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Trace {
    fn new(method: &str, path: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now_millis(),
            method: method.to_string(),
            path: path.to_string(),
            status_code: None,
            duration: None,
            spans: Vec::new(),
            logs: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status_code.is_some()
    }
}

/// Filters for [`TraceStore::get_traces`]. All set filters must match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraceQuery {
    pub method: Option<String>,
    pub status_code: Option<u16>,
    pub min_duration: Option<f64>,
    pub limit: Option<usize>,
}

impl TraceQuery {
    fn matches(&self, trace: &Trace) -> bool {
        if let Some(method) = &self.method {
            if trace.method != *method {
                return false;
            }
        }
        if let Some(status) = self.status_code {
            if trace.status_code != Some(status) {
                return false;
            }
        }
        if let Some(min) = self.min_duration {
            if !trace.duration.is_some_and(|d| d >= min) {
                return false;
            }
        }
        true
    }
}

/// Serialization format for [`TraceStore::export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Ndjson,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Ndjson => "ndjson",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "ndjson" => Ok(ExportFormat::Ndjson),
            other => Err(format!("unsupported export format: {other}")),
        }
    }
}

/// FIFO-evicted collection of traces.
///
/// Every mutation happens under one lock acquisition, so an append or an
/// evict-then-insert is never observed half done.
#[derive(Debug)]
pub struct TraceStore {
    traces: Mutex<BoundedRing<Trace>>,
}

impl TraceStore {
    pub fn new(max_traces: usize) -> Self {
        Self {
            traces: Mutex::new(BoundedRing::new(max_traces)),
        }
    }

    /// Allocate and insert a new trace, evicting the oldest if full.
    pub fn create_trace(&self, method: &str, path: &str) -> Trace {
        let trace = Trace::new(method, path);
        let evicted = self.traces.lock().push(trace.clone());
        metrics::record_trace_created();
        if let Some(old) = evicted {
            metrics::record_eviction("trace");
            tracing::trace!(trace_id = %old.id, "Trace evicted");
        }
        trace
    }

    /// Append a closed span. Returns false if the trace is unknown.
    pub fn add_span(&self, trace_id: &str, span: Span) -> bool {
        self.update(trace_id, |trace| trace.spans.push(span)).is_some()
    }

    /// Record the final status and duration, returning the updated trace.
    pub fn complete_trace(&self, trace_id: &str, status_code: u16, duration_ms: f64) -> Option<Trace> {
        self.update(trace_id, |trace| {
            trace.status_code = Some(status_code);
            trace.duration = Some(duration_ms);
            trace.clone()
        })
    }

    /// Merge one metadata entry. Returns false if the trace is unknown.
    pub fn add_context(&self, trace_id: &str, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        self.update(trace_id, |trace| {
            trace.metadata.insert(key, value);
        })
        .is_some()
    }

    /// Merge `entries` into the object stored under `key`, replacing a
    /// non-object value. Returns false if the trace is unknown.
    pub fn merge_context(&self, trace_id: &str, key: &str, entries: Map<String, Value>) -> bool {
        self.update(trace_id, |trace| {
            let slot = trace
                .metadata
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(existing) = slot {
                existing.extend(entries);
            }
        })
        .is_some()
    }

    /// Append a log entry to the trace's own log list.
    pub fn append_log(&self, trace_id: &str, entry: LogEntry) -> bool {
        self.update(trace_id, |trace| trace.logs.push(entry)).is_some()
    }

    /// Copy of the trace's current metadata.
    pub fn metadata(&self, trace_id: &str) -> Option<Map<String, Value>> {
        self.traces
            .lock()
            .find(|t| t.id == trace_id)
            .map(|t| t.metadata.clone())
    }

    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        self.traces.lock().find(|t| t.id == trace_id).cloned()
    }

    /// Traces newest-first, filtered, then truncated to `limit`.
    pub fn get_traces(&self, query: &TraceQuery) -> Vec<Trace> {
        self.traces
            .lock()
            .iter_newest()
            .filter(|trace| query.matches(trace))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn get_all_traces(&self) -> Vec<Trace> {
        self.get_traces(&TraceQuery::default())
    }

    /// Serialize all traces newest-first.
    pub fn export(&self, format: ExportFormat) -> serde_json::Result<String> {
        let traces = self.get_all_traces();
        match format {
            ExportFormat::Json => serde_json::to_string_pretty(&traces),
            ExportFormat::Ndjson => {
                let mut out = String::new();
                for trace in &traces {
                    out.push_str(&serde_json::to_string(trace)?);
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }

    pub fn clear(&self) {
        self.traces.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.traces.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.traces.lock().capacity()
    }

    fn update<R>(&self, trace_id: &str, f: impl FnOnce(&mut Trace) -> R) -> Option<R> {
        let mut traces = self.traces.lock();
        traces.find_mut(|t| t.id == trace_id).map(f)
    }
}
