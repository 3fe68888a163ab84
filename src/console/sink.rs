//! The logging interface and its swappable sink slot.

use std::error::Error as StdError;
use std::io::Write;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::store::LogLevel;

/// One argument to a logging call.
#[derive(Debug, Clone, PartialEq)]
pub enum LogArg {
    Text(String),
    /// An error-like value: contributes its message, and its stack on error level.
    Error { message: String, stack: Option<String> },
    Value(Value),
}

impl LogArg {
    /// Build an error argument from any error, using its source chain and
    /// a captured backtrace (when enabled) as the stack.
    pub fn error(err: &(dyn StdError + 'static)) -> Self {
        let mut stack = format!("Error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str(&format!("\n    caused by: {cause}"));
            source = cause.source();
        }
        let backtrace = std::backtrace::Backtrace::capture();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            stack.push_str(&format!("\n{backtrace}"));
        }
        LogArg::Error {
            message: err.to_string(),
            stack: Some(stack),
        }
    }

    /// Text this argument contributes to the flattened message.
    pub fn to_message_part(&self) -> String {
        match self {
            LogArg::Text(text) => text.clone(),
            LogArg::Error { message, .. } => message.clone(),
            LogArg::Value(Value::String(s)) => s.clone(),
            LogArg::Value(value) => serde_json::to_string(value).unwrap_or_else(|_| value.to_string()),
        }
    }

    /// JSON form kept alongside the entry as raw args.
    pub fn to_value(&self) -> Value {
        match self {
            LogArg::Text(text) => Value::String(text.clone()),
            LogArg::Error { message, .. } => serde_json::json!({ "error": message }),
            LogArg::Value(value) => value.clone(),
        }
    }

    pub fn stack(&self) -> Option<&str> {
        match self {
            LogArg::Error { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }
}

impl From<&str> for LogArg {
    fn from(text: &str) -> Self {
        LogArg::Text(text.to_string())
    }
}

impl From<String> for LogArg {
    fn from(text: String) -> Self {
        LogArg::Text(text)
    }
}

impl From<Value> for LogArg {
    fn from(value: Value) -> Self {
        LogArg::Value(value)
    }
}

/// Join arguments into one message string, space-separated.
pub fn flatten_message(args: &[LogArg]) -> String {
    args.iter()
        .map(LogArg::to_message_part)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Destination of logging calls made through a [`Console`].
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, args: &[LogArg]);
}

/// Default sink: info-ish levels to stdout, warn and error to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl LogSink for StdioSink {
    fn write(&self, level: LogLevel, args: &[LogArg]) {
        let line = flatten_message(args);
        match level {
            LogLevel::Warn | LogLevel::Error => {
                let _ = writeln!(std::io::stderr(), "{line}");
            }
            _ => {
                let _ = writeln!(std::io::stdout(), "{line}");
            }
        }
    }
}

/// Slot contents. Sinks are boxed so the slot can hold any implementation.
pub type SinkHandle = Arc<Box<dyn LogSink>>;

/// The process logging interface. Every call goes through the current sink.
pub struct Console {
    slot: ArcSwap<Box<dyn LogSink>>,
}

impl Console {
    pub fn new() -> Self {
        Self::with_sink(StdioSink)
    }

    pub fn with_sink(sink: impl LogSink + 'static) -> Self {
        Self {
            slot: ArcSwap::from_pointee(Box::new(sink) as Box<dyn LogSink>),
        }
    }

    pub fn write(&self, level: LogLevel, args: &[LogArg]) {
        self.slot.load().write(level, args);
    }

    pub fn log(&self, args: &[LogArg]) {
        self.write(LogLevel::Log, args);
    }

    pub fn debug(&self, args: &[LogArg]) {
        self.write(LogLevel::Debug, args);
    }

    pub fn info(&self, args: &[LogArg]) {
        self.write(LogLevel::Info, args);
    }

    pub fn warn(&self, args: &[LogArg]) {
        self.write(LogLevel::Warn, args);
    }

    pub fn error(&self, args: &[LogArg]) {
        self.write(LogLevel::Error, args);
    }

    /// Current sink.
    pub fn sink(&self) -> SinkHandle {
        self.slot.load_full()
    }

    /// Put `sink` in the slot, returning what was there.
    pub fn replace(&self, sink: SinkHandle) -> SinkHandle {
        self.slot.swap(sink)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
