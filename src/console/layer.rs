//! `tracing` integration: every application event is captured like a console call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::console::interceptor::LogCapture;
use crate::console::sink::LogArg;
use crate::store::LogLevel;

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

tokio::task_local! {
    static SUPPRESSED: ();
}

/// Run `future` with event capture switched off for its whole extent.
///
/// Socket I/O toward observers runs under this: transport crates log every
/// frame they write, and capturing those would push another frame.
pub async fn without_capture<F: Future>(future: F) -> F::Output {
    SUPPRESSED.scope((), future).await
}

/// Synchronous form of [`without_capture`].
pub fn without_capture_sync<R>(f: impl FnOnce() -> R) -> R {
    SUPPRESSED.sync_scope((), f)
}

fn capture_suppressed() -> bool {
    SUPPRESSED.try_with(|_| ()).is_ok()
}

/// Subscriber layer feeding events into a [`LogCapture`].
///
/// Events emitted by this crate are skipped; the gateway logs while it
/// pushes entries, and capturing those would feed back into itself.
#[derive(Debug, Clone)]
pub struct CaptureLayer {
    capture: Arc<LogCapture>,
}

impl CaptureLayer {
    pub fn new(capture: Arc<LogCapture>) -> Self {
        Self { capture }
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) || capture_suppressed() {
            return;
        }
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.capture.record(LogLevel::from(metadata.level()), &visitor.into_args());
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    errors: Vec<LogArg>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        // bookkeeping fields added by the `log` bridge
        if !field.name().starts_with("log.") {
            self.fields.insert(field.name().to_string(), value);
        }
    }

    fn into_args(self) -> Vec<LogArg> {
        let mut args = Vec::with_capacity(2 + self.errors.len());
        if let Some(message) = self.message {
            args.push(LogArg::Text(message));
        }
        args.extend(self.errors);
        if !self.fields.is_empty() {
            args.push(LogArg::Value(Value::Object(self.fields)));
        }
        args
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.errors.push(LogArg::error(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.insert(field, Value::from(format!("{value:?}")));
        }
    }
}
