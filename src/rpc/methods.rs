//! Core methods answered from the stores.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::rpc::envelope::RpcError;
use crate::rpc::handler::RpcHandler;
use crate::spans::SpanTracer;
use crate::store::{ExportFormat, LogQuery, LogStore, TraceQuery, TraceStore};

/// Reports the number of connected observers.
pub type ClientCounter = Arc<dyn Fn() -> usize + Send + Sync>;

/// Everything the core methods read from.
#[derive(Clone)]
pub struct CoreState {
    pub traces: Arc<TraceStore>,
    pub logs: Arc<LogStore>,
    pub tracer: Arc<SpanTracer>,
    pub clients: ClientCounter,
    pub started_at: Instant,
}

#[derive(Deserialize)]
struct TraceIdParams {
    id: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ExportParams {
    format: ExportFormat,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientMetricsParams {
    trace_id: String,
    metrics: Map<String, Value>,
}

/// Params that may be omitted entirely.
fn optional_params<T: DeserializeOwned + Default>(params: Option<Value>) -> Result<T, RpcError> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| RpcError::invalid_params(e.to_string())),
    }
}

fn required_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let value = params.ok_or_else(|| RpcError::invalid_params("params are required"))?;
    serde_json::from_value(value).map_err(|e| RpcError::invalid_params(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

/// Register `status`, `traces/*` and `logs/*`.
pub fn register_core_methods(rpc: &RpcHandler, state: CoreState) {
    let s = state.clone();
    rpc.register_sync("status", move |_| {
        Ok(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptimeMs": s.started_at.elapsed().as_millis() as u64,
            "traceCount": s.traces.len(),
            "logCount": s.logs.len(),
            "activeSpans": s.tracer.active_count(),
            "clientCount": (s.clients)(),
        }))
    });

    let traces = state.traces.clone();
    rpc.register_sync("traces/list", move |params| {
        let query: TraceQuery = optional_params(params)?;
        to_value(traces.get_traces(&query))
    });

    let traces = state.traces.clone();
    rpc.register_sync("traces/get", move |params| {
        let TraceIdParams { id } = required_params(params)?;
        to_value(traces.get_trace(&id))
    });

    let traces = state.traces.clone();
    rpc.register_sync("traces/clear", move |_| {
        traces.clear();
        Ok(json!({ "success": true }))
    });

    let traces = state.traces.clone();
    rpc.register_sync("traces/export", move |params| {
        let ExportParams { format } = optional_params(params)?;
        let data = traces
            .export(format)
            .map_err(|e| RpcError::internal(e.to_string()))?;
        Ok(json!({ "format": format.as_str(), "data": data }))
    });

    let traces = state.traces.clone();
    rpc.register_sync("traces/addClientMetrics", move |params| {
        let ClientMetricsParams { trace_id, metrics } = required_params(params)?;
        let success = traces.merge_context(&trace_id, "clientMetrics", metrics);
        Ok(json!({ "success": success }))
    });

    let logs = state.logs.clone();
    rpc.register_sync("logs/list", move |params| {
        let query: LogQuery = optional_params(params)?;
        to_value(logs.get_logs(&query))
    });

    let logs = state.logs;
    rpc.register_sync("logs/clear", move |_| {
        logs.clear();
        Ok(json!({ "success": true }))
    });
}
