//! Host-facing entry point.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::clock::now_millis;
use crate::config::DevTraceConfig;
use crate::console::{CaptureLayer, Console, ConsoleInterceptor, LogCapture};
use crate::context;
use crate::gateway::{gateway_router, Gateway, GatewayError};
use crate::lifecycle::shutdown::wait as shutdown_signal;
use crate::rpc::{register_core_methods, CoreState, RpcHandler};
use crate::spans::{SpanHelper, SpanTracer};
use crate::store::{LogEntry, LogLevel, LogStore, Trace, TraceStore};

/// Notification types pushed to observers.
pub mod events {
    pub const TRACE_NEW: &str = "trace.new";
    pub const LOG_ENTRY: &str = "log.entry";
    pub const LOG_STDOUT: &str = "log.stdout";
    pub const LOG_STDERR: &str = "log.stderr";
    pub const APP_STARTED: &str = "app.started";
    pub const APP_STOPPED: &str = "app.stopped";
}

/// Process output stream relayed by [`DevTrace::capture_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn event(&self) -> &'static str {
        match self {
            OutputStream::Stdout => events::LOG_STDOUT,
            OutputStream::Stderr => events::LOG_STDERR,
        }
    }
}

/// One isolated observability core: stores, tracer, protocol table,
/// gateway and console, wired together.
pub struct DevTrace {
    config: DevTraceConfig,
    traces: Arc<TraceStore>,
    logs: Arc<LogStore>,
    tracer: Arc<SpanTracer>,
    gateway: Arc<Gateway>,
    capture: Arc<LogCapture>,
    console: Arc<Console>,
    interceptor: ConsoleInterceptor,
    started_at: Instant,
}

impl DevTrace {
    pub fn new(config: DevTraceConfig) -> Self {
        let started_at = Instant::now();
        let traces = Arc::new(TraceStore::new(config.store.max_traces));
        let logs = Arc::new(LogStore::new(config.store.max_logs));
        let tracer = Arc::new(SpanTracer::new());

        let rpc = Arc::new(RpcHandler::new());
        let gateway = Arc::new(Gateway::new(rpc.clone(), config.gateway.outbound_buffer));

        // The table is owned by the gateway, so it may only see it weakly.
        let observers = Arc::downgrade(&gateway);
        register_core_methods(
            &rpc,
            CoreState {
                traces: traces.clone(),
                logs: logs.clone(),
                tracer: tracer.clone(),
                clients: Arc::new(move || observers.upgrade().map_or(0, |gw| gw.client_count())),
                started_at,
            },
        );

        let capture = Arc::new(LogCapture::new(traces.clone(), logs.clone()));
        let push = gateway.clone();
        capture.set_listener(move |entry| push_log(&push, entry));

        let console = Arc::new(Console::new());
        let interceptor = ConsoleInterceptor::new(capture.clone());
        if config.capture.console {
            interceptor.install(&console);
        }

        tracing::debug!(
            max_traces = config.store.max_traces,
            max_logs = config.store.max_logs,
            methods = ?rpc.methods(),
            "DevTrace initialized"
        );

        Self {
            config,
            traces,
            logs,
            tracer,
            gateway,
            capture,
            console,
            interceptor,
            started_at,
        }
    }

    pub fn config(&self) -> &DevTraceConfig {
        &self.config
    }

    pub fn traces(&self) -> &Arc<TraceStore> {
        &self.traces
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    pub fn tracer(&self) -> &Arc<SpanTracer> {
        &self.tracer
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Dispatch table; hosts may register extra methods.
    pub fn rpc(&self) -> &Arc<RpcHandler> {
        self.gateway.rpc()
    }

    /// Logging interface whose calls are captured while the interceptor is installed.
    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    pub fn interceptor(&self) -> &ConsoleInterceptor {
        &self.interceptor
    }

    /// Begin a trace for an incoming request.
    pub fn create_trace(&self, method: &str, path: &str) -> Trace {
        let trace = self.traces.create_trace(method, path);
        tracing::debug!(trace_id = %trace.id, method = %method, path = %path, "Trace created");
        trace
    }

    /// Finish a trace and push it to observers.
    pub fn complete_trace(&self, trace_id: &str, status_code: u16, duration_ms: f64) -> Option<Trace> {
        let trace = self.traces.complete_trace(trace_id, status_code, duration_ms)?;
        match serde_json::to_value(&trace) {
            Ok(payload) => {
                self.gateway.broadcast(events::TRACE_NEW, payload);
            }
            Err(e) => tracing::warn!(trace_id = %trace_id, error = %e, "Failed to encode trace"),
        }
        Some(trace)
    }

    /// Attach a metadata entry to a trace; later logs copy it as context.
    pub fn add_context(&self, trace_id: &str, key: impl Into<String>, value: impl Into<Value>) -> bool {
        self.traces.add_context(trace_id, key, value.into())
    }

    /// Record a log line tagged with the ambient trace and push it.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, meta: Option<Value>) -> LogEntry {
        self.capture
            .record_entry(level, message.into(), meta.map(|m| vec![m]), None)
    }

    /// Span helper bound to `trace_id`.
    pub fn spans(&self, trace_id: impl Into<String>) -> SpanHelper {
        SpanHelper::new(trace_id, self.tracer.clone(), self.traces.clone())
    }

    /// Run request handling with `trace_id` as the ambient trace.
    pub async fn run_with_trace<F: Future>(&self, trace_id: impl Into<String>, future: F) -> F::Output {
        context::run_with_trace(trace_id, future).await
    }

    pub fn broadcast(&self, event: &str, payload: Value) -> usize {
        self.gateway.broadcast(event, payload)
    }

    pub fn client_count(&self) -> usize {
        self.gateway.client_count()
    }

    /// Relay a chunk of process output to observers.
    pub fn capture_output(&self, stream: OutputStream, text: &str) -> usize {
        self.gateway.broadcast(
            stream.event(),
            json!({ "text": text, "timestamp": now_millis() }),
        )
    }

    /// Layer that captures `tracing` events into this instance's log store.
    pub fn capture_layer(&self) -> CaptureLayer {
        CaptureLayer::new(self.capture.clone())
    }

    /// Tell observers the host application is up. Hosts that merge
    /// [`router`](Self::router) call this once their own server is accepting.
    pub fn app_started(&self, address: Option<&str>) -> usize {
        announce_started(&self.gateway, address)
    }

    /// Tell observers the host application is going down.
    pub fn app_stopped(&self) -> usize {
        announce_stopped(&self.gateway)
    }

    /// Routes for observers and the liveness check, for merging into a host app.
    pub fn router(&self) -> Router {
        gateway_router(self.gateway.clone(), &self.config.gateway, self.started_at)
    }

    /// Serve the gateway on `listener` until `shutdown` fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            ws_path = %self.config.gateway.ws_path,
            "Gateway listening"
        );

        // Only observers attached through a host-merged router can hear this one.
        announce_started(&self.gateway, Some(&addr.to_string()));

        let gateway = self.gateway.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown_signal(shutdown).await;
                announce_stopped(&gateway);
                let closed = gateway.disconnect_all();
                tracing::info!(observers = closed, "Gateway shutting down");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn bind_and_serve(&self, shutdown: broadcast::Receiver<()>) -> Result<(), GatewayError> {
        let address = self.config.gateway.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| GatewayError::Bind { address, source })?;
        self.serve(listener, shutdown).await
    }
}

fn announce_started(gateway: &Gateway, address: Option<&str>) -> usize {
    gateway.broadcast(
        events::APP_STARTED,
        json!({
            "address": address,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": now_millis(),
        }),
    )
}

fn announce_stopped(gateway: &Gateway) -> usize {
    gateway.broadcast(events::APP_STOPPED, json!({ "timestamp": now_millis() }))
}

fn push_log(gateway: &Gateway, entry: &LogEntry) {
    match serde_json::to_value(entry) {
        Ok(payload) => {
            gateway.broadcast(events::LOG_ENTRY, payload);
        }
        Err(e) => tracing::warn!(log_id = entry.id, error = %e, "Failed to encode log entry"),
    }
}

impl Default for DevTrace {
    fn default() -> Self {
        Self::new(DevTraceConfig::default())
    }
}

impl std::fmt::Debug for DevTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevTrace")
            .field("traces", &self.traces.len())
            .field("logs", &self.logs.len())
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}
