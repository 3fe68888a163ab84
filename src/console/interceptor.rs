//! Log capture and the console interceptor.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::console::sink::{flatten_message, Console, LogArg, LogSink, SinkHandle};
use crate::context::current_trace_id;
use crate::store::{LogDraft, LogEntry, LogLevel, LogStore, TraceStore};

/// Called with every captured entry after it is stored.
pub type LogListener = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Turns logging calls into stored, trace-tagged log entries.
pub struct LogCapture {
    traces: Arc<TraceStore>,
    logs: Arc<LogStore>,
    listener: RwLock<Option<LogListener>>,
}

impl LogCapture {
    pub fn new(traces: Arc<TraceStore>, logs: Arc<LogStore>) -> Self {
        Self {
            traces,
            logs,
            listener: RwLock::new(None),
        }
    }

    pub fn set_listener(&self, listener: impl Fn(&LogEntry) + Send + Sync + 'static) {
        *self.listener.write() = Some(Arc::new(listener));
    }

    /// Capture a logging call made with loose arguments.
    pub fn record(&self, level: LogLevel, args: &[LogArg]) -> LogEntry {
        let message = flatten_message(args);
        let stack = match level {
            LogLevel::Error => args
                .iter()
                .find(|arg| matches!(arg, LogArg::Error { .. }))
                .and_then(LogArg::stack)
                .map(str::to_string),
            _ => None,
        };
        let raw = if args.iter().all(|arg| matches!(arg, LogArg::Text(_))) {
            None
        } else {
            Some(args.iter().map(LogArg::to_value).collect())
        };
        self.record_entry(level, message, raw, stack)
    }

    /// Capture an already-formatted entry, tagging it with the ambient trace.
    pub fn record_entry(
        &self,
        level: LogLevel,
        message: String,
        args: Option<Vec<Value>>,
        stack: Option<String>,
    ) -> LogEntry {
        let ambient = current_trace_id();
        let context = ambient.as_deref().and_then(|id| self.traces.metadata(id));
        let trace_id = ambient.filter(|_| context.is_some());

        let entry = self.logs.add_log(LogDraft {
            level,
            message,
            args,
            stack,
            trace_id,
            context,
        });

        if let Some(trace_id) = &entry.trace_id {
            self.traces.append_log(trace_id, entry.clone());
        }
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener(&entry);
        }
        entry
    }
}

impl std::fmt::Debug for LogCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCapture")
            .field("listener", &self.listener.read().is_some())
            .finish_non_exhaustive()
    }
}

/// Sink installed into a [`Console`] while intercepting.
struct CapturingSink {
    prior: SinkHandle,
    capture: Arc<LogCapture>,
}

impl LogSink for CapturingSink {
    fn write(&self, level: LogLevel, args: &[LogArg]) {
        self.prior.write(level, args);
        self.capture.record(level, args);
    }
}

struct Installed {
    console: Arc<Console>,
    prior: SinkHandle,
}

/// Owns the console's sink slot while installed and restores it exactly.
pub struct ConsoleInterceptor {
    capture: Arc<LogCapture>,
    installed: Mutex<Option<Installed>>,
}

impl ConsoleInterceptor {
    pub fn new(capture: Arc<LogCapture>) -> Self {
        Self {
            capture,
            installed: Mutex::new(None),
        }
    }

    /// Wrap the console's current sink. Returns false if already installed.
    pub fn install(&self, console: &Arc<Console>) -> bool {
        let mut installed = self.installed.lock();
        if installed.is_some() {
            return false;
        }
        let prior = console.sink();
        console.replace(Arc::new(Box::new(CapturingSink {
            prior: prior.clone(),
            capture: self.capture.clone(),
        })));
        *installed = Some(Installed {
            console: console.clone(),
            prior,
        });
        tracing::debug!("Console interceptor installed");
        true
    }

    /// Put the prior sink back. Returns false if not installed.
    pub fn uninstall(&self) -> bool {
        let Some(installed) = self.installed.lock().take() else {
            return false;
        };
        installed.console.replace(installed.prior);
        tracing::debug!("Console interceptor removed");
        true
    }

    pub fn is_installed(&self) -> bool {
        self.installed.lock().is_some()
    }

    pub fn capture(&self) -> &Arc<LogCapture> {
        &self.capture
    }
}

impl Drop for ConsoleInterceptor {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::run_with_trace_sync;
    use serde_json::json;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl LogSink for Recorder {
        fn write(&self, level: LogLevel, args: &[LogArg]) {
            self.0.lock().push(format!("{level}:{}", flatten_message(args)));
        }
    }

    fn setup() -> (Arc<TraceStore>, Arc<LogStore>, ConsoleInterceptor) {
        let traces = Arc::new(TraceStore::new(8));
        let logs = Arc::new(LogStore::new(32));
        let capture = Arc::new(LogCapture::new(traces.clone(), logs.clone()));
        (traces, logs, ConsoleInterceptor::new(capture))
    }

    #[test]
    fn original_runs_before_capture_and_listener() {
        let (_, logs, interceptor) = setup();
        let recorder = Recorder::default();
        let console = Arc::new(Console::with_sink(recorder.clone()));

        let order = recorder.0.clone();
        interceptor
            .capture()
            .set_listener(move |entry| order.lock().push(format!("listener:{}", entry.message)));
        interceptor.install(&console);

        console.info(&["hello".into(), json!(1).into()]);
        assert_eq!(*recorder.0.lock(), ["info:hello 1", "listener:hello 1"]);
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn install_and_uninstall_are_idempotent() {
        let (_, logs, interceptor) = setup();
        let console = Arc::new(Console::new());
        let original = console.sink();

        assert!(interceptor.install(&console));
        assert!(!interceptor.install(&console));
        assert!(interceptor.uninstall());
        assert!(!interceptor.uninstall());
        assert!(Arc::ptr_eq(&original, &console.sink()));

        console.log(&["after".into()]);
        assert!(logs.is_empty());
    }

    #[test]
    fn ambient_trace_context_is_copied() {
        let (traces, logs, interceptor) = setup();
        let console = Arc::new(Console::with_sink(Recorder::default()));
        interceptor.install(&console);

        let trace = traces.create_trace("GET", "/orders");
        traces.add_context(&trace.id, "userId", json!(42));

        run_with_trace_sync(trace.id.clone(), || console.warn(&["slow query".into()]));
        console.log(&["outside".into()]);

        let entries = logs.get_logs(&Default::default());
        let outside = &entries[0];
        let inside = &entries[1];
        assert_eq!(outside.context, None);
        assert_eq!(outside.trace_id, None);
        assert_eq!(inside.trace_id.as_deref(), Some(trace.id.as_str()));
        assert_eq!(inside.context.as_ref(), traces.metadata(&trace.id).as_ref());

        // later metadata changes do not leak into the stored snapshot
        traces.add_context(&trace.id, "cart", json!(3));
        let stored = logs.get_logs(&Default::default());
        assert!(!stored[1].context.as_ref().unwrap().contains_key("cart"));

        let trace = traces.get_trace(&trace.id).unwrap();
        assert_eq!(trace.logs.len(), 1);
        assert_eq!(trace.logs[0].message, "slow query");
    }

    #[test]
    fn error_level_extracts_first_error_stack() {
        let (_, logs, interceptor) = setup();
        let console = Arc::new(Console::with_sink(Recorder::default()));
        interceptor.install(&console);

        let err = std::io::Error::other("connection reset");
        console.error(&["upstream".into(), LogArg::error(&err)]);
        console.warn(&[LogArg::error(&err)]);

        let entries = logs.get_logs(&Default::default());
        assert!(entries[0].stack.is_none());
        let error_entry = &entries[1];
        assert_eq!(error_entry.message, "upstream connection reset");
        assert!(error_entry.stack.as_deref().unwrap().contains("connection reset"));
        assert_eq!(error_entry.args.as_ref().unwrap()[1], json!({"error": "connection reset"}));
    }

    #[test]
    fn evicted_trace_yields_no_context() {
        let traces = Arc::new(TraceStore::new(1));
        let logs = Arc::new(LogStore::new(4));
        let capture = LogCapture::new(traces.clone(), logs.clone());
        let old = traces.create_trace("GET", "/old");
        traces.create_trace("GET", "/new");

        let entry = run_with_trace_sync(old.id, || capture.record(LogLevel::Info, &["late".into()]));
        assert!(entry.context.is_none());
        assert!(entry.trace_id.is_none());
    }
}
