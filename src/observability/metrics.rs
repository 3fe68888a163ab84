//! Metrics collection.
//!
//! # Metrics
//! - `devtrace_traces_created_total` (counter)
//! - `devtrace_evictions_total` (counter): by store (`trace`, `log`)
//! - `devtrace_logs_total` (counter): by level
//! - `devtrace_rpc_calls_total` (counter): by method, outcome
//! - `devtrace_observers` (gauge): connected observers
//! - `devtrace_observers_dropped_total` (counter): slow or broken observers
//! - `devtrace_broadcasts_total` (counter): by event type

use metrics::{counter, gauge};

pub fn record_trace_created() {
    counter!("devtrace_traces_created_total").increment(1);
}

pub fn record_eviction(store: &'static str) {
    counter!("devtrace_evictions_total", "store" => store).increment(1);
}

pub fn record_log(level: &'static str) {
    counter!("devtrace_logs_total", "level" => level).increment(1);
}

pub fn record_rpc_call(method: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("devtrace_rpc_calls_total", "method" => method.to_string(), "outcome" => outcome).increment(1);
}

pub fn set_observers(count: usize) {
    gauge!("devtrace_observers").set(count as f64);
}

pub fn record_observer_dropped() {
    counter!("devtrace_observers_dropped_total").increment(1);
}

pub fn record_broadcast(event: &str) {
    counter!("devtrace_broadcasts_total", "event" => event.to_string()).increment(1);
}
