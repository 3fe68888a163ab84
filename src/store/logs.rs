//! Bounded log buffer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::now_millis;
use crate::observability::metrics;
use crate::store::ring::BoundedRing;

/// Severity of a captured log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Log,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Log => "log",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::INFO => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

/// One captured log line. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: u64,
    /// Epoch milliseconds.
    pub timestamp: u64,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Copy of the owning trace's metadata at log time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

/// Input to [`LogStore::add_log`].
#[derive(Debug, Clone)]
pub struct LogDraft {
    pub level: LogLevel,
    pub message: String,
    pub args: Option<Vec<Value>>,
    pub stack: Option<String>,
    pub trace_id: Option<String>,
    pub context: Option<Map<String, Value>>,
}

impl LogDraft {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            args: None,
            stack: None,
            trace_id: None,
            context: None,
        }
    }
}

/// Filters for [`LogStore::get_logs`]. All set filters must match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    /// Case-insensitive substring over message, args and context values.
    pub search: Option<String>,
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<u64>,
    pub limit: Option<usize>,
}

impl LogQuery {
    fn matches(&self, entry: &LogEntry, needle: Option<&str>) -> bool {
        if self.level.is_some_and(|level| level != entry.level) {
            return false;
        }
        if self.since.is_some_and(|since| entry.timestamp < since) {
            return false;
        }
        match needle {
            Some(needle) => search_matches(entry, needle),
            None => true,
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn search_matches(entry: &LogEntry, needle: &str) -> bool {
    if contains_ci(&entry.message, needle) {
        return true;
    }
    let in_args = entry
        .args
        .iter()
        .flatten()
        .any(|arg| contains_ci(&value_text(arg), needle));
    let in_context = entry
        .context
        .iter()
        .flat_map(|ctx| ctx.values())
        .any(|v| contains_ci(&value_text(v), needle));
    in_args || in_context
}

/// FIFO-evicted circular buffer of log entries.
#[derive(Debug)]
pub struct LogStore {
    entries: Mutex<BoundedRing<LogEntry>>,
    next_id: AtomicU64,
}

impl LogStore {
    pub fn new(max_logs: usize) -> Self {
        Self {
            entries: Mutex::new(BoundedRing::new(max_logs)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a new entry, evicting the oldest one on overflow.
    ///
    /// Id and timestamp are assigned under the ring lock, so stored order,
    /// id order and time order agree.
    pub fn add_log(&self, draft: LogDraft) -> LogEntry {
        let mut entries = self.entries.lock();
        let entry = LogEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp: now_millis(),
            level: draft.level,
            message: draft.message,
            args: draft.args,
            stack: draft.stack,
            trace_id: draft.trace_id,
            context: draft.context,
        };
        let evicted = entries.push(entry.clone()).is_some();
        drop(entries);

        metrics::record_log(entry.level.as_str());
        if evicted {
            metrics::record_eviction("log");
        }
        entry
    }

    /// Entries newest-first, filtered, then truncated to `limit`.
    pub fn get_logs(&self, query: &LogQuery) -> Vec<LogEntry> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let entries = self.entries.lock();
        entries
            .iter_newest()
            .filter(|entry| query.matches(entry, needle.as_deref()))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(level: LogLevel, msg: &str) -> LogDraft {
        LogDraft::new(level, msg)
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let store = LogStore::new(2);
        store.add_log(draft(LogLevel::Info, "one"));
        store.add_log(draft(LogLevel::Info, "two"));
        store.add_log(draft(LogLevel::Info, "three"));

        let messages: Vec<_> = store
            .get_logs(&LogQuery::default())
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, ["three", "two"]);
    }

    #[test]
    fn concurrent_writers_keep_stored_order_consistent() {
        let store = std::sync::Arc::new(LogStore::new(2000));
        let writers: Vec<_> = (0..8)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        store.add_log(draft(LogLevel::Debug, &format!("w{w}-{i}")));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let entries = store.get_logs(&LogQuery::default());
        assert_eq!(entries.len(), 1600);
        for pair in entries.windows(2) {
            assert!(pair[0].id > pair[1].id);
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn ids_increase() {
        let store = LogStore::new(10);
        let a = store.add_log(draft(LogLevel::Log, "a"));
        let b = store.add_log(draft(LogLevel::Log, "b"));
        assert!(b.id > a.id);
    }

    #[test]
    fn level_filter_and_limit() {
        let store = LogStore::new(10);
        store.add_log(draft(LogLevel::Error, "e1"));
        store.add_log(draft(LogLevel::Info, "i1"));
        store.add_log(draft(LogLevel::Error, "e2"));
        store.add_log(draft(LogLevel::Error, "e3"));

        let query = LogQuery {
            level: Some(LogLevel::Error),
            limit: Some(2),
            ..Default::default()
        };
        let messages: Vec<_> = store.get_logs(&query).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["e3", "e2"]);
    }

    #[test]
    fn search_spans_message_args_and_context() {
        let store = LogStore::new(10);
        store.add_log(draft(LogLevel::Info, "User LOGIN ok"));

        let mut with_args = draft(LogLevel::Info, "payload");
        with_args.args = Some(vec![json!({"account": "Login-42"})]);
        store.add_log(with_args);

        let mut with_ctx = draft(LogLevel::Info, "ctx");
        let mut ctx = Map::new();
        ctx.insert("route".into(), json!("/login"));
        with_ctx.context = Some(ctx);
        store.add_log(with_ctx);

        store.add_log(draft(LogLevel::Info, "unrelated"));

        let query = LogQuery {
            search: Some("login".into()),
            ..Default::default()
        };
        let messages: Vec<_> = store.get_logs(&query).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["ctx", "payload", "User LOGIN ok"]);
    }

    #[test]
    fn since_is_inclusive() {
        let store = LogStore::new(10);
        let entry = store.add_log(draft(LogLevel::Info, "x"));
        let query = LogQuery {
            since: Some(entry.timestamp),
            ..Default::default()
        };
        assert_eq!(store.get_logs(&query).len(), 1);
        let query = LogQuery {
            since: Some(entry.timestamp + 60_000),
            ..Default::default()
        };
        assert!(store.get_logs(&query).is_empty());
    }

    #[test]
    fn clear_empties() {
        let store = LogStore::new(10);
        store.add_log(draft(LogLevel::Warn, "x"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn level_from_tracing() {
        assert_eq!(LogLevel::from(&tracing::Level::TRACE), LogLevel::Debug);
        assert_eq!(LogLevel::from(&tracing::Level::WARN), LogLevel::Warn);
        assert_eq!(serde_json::to_value(LogLevel::Log).unwrap(), json!("log"));
    }
}
