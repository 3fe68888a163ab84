//! Standalone DevTrace gateway.
//!
//! Runs one observability core with its observer gateway, for poking at the
//! protocol with `devtrace-cli` or a dashboard without embedding it in a host.
//!
//! ```text
//! devtrace.toml ──→ config ──→ DevTrace ──→ gateway (/ws, /health)
//!                                  │
//!                                  └── tracing events → log store → observers
//! ```

use std::path::PathBuf;

use clap::Parser;

use devtrace::config::{load_config, DevTraceConfig};
use devtrace::lifecycle::{signals, Shutdown};
use devtrace::observability::logging;
use devtrace::DevTrace;

#[derive(Parser)]
#[command(name = "devtrace")]
#[command(about = "Standalone DevTrace observer gateway", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override gateway.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => DevTraceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.gateway.bind_address = bind;
    }

    let devtrace = DevTrace::new(config);
    let capture = devtrace
        .config()
        .capture
        .tracing
        .then(|| devtrace.capture_layer());
    logging::init_logging(&devtrace.config().observability, capture)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %devtrace.config().gateway.bind_address,
        max_traces = devtrace.config().store.max_traces,
        max_logs = devtrace.config().store.max_logs,
        "devtrace starting"
    );

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_ctrl_c(shutdown));

    devtrace.bind_and_serve(rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
