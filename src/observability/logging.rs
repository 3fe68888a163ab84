//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::console::CaptureLayer;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.log_level`. When `capture` is given, every
/// application event also flows into the log store.
pub fn init_logging(
    config: &ObservabilityConfig,
    capture: Option<CaptureLayer>,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(capture)
        .try_init()
}

fn default_directives(level: &str) -> String {
    format!("{level},devtrace={level},tower_http=info")
}
