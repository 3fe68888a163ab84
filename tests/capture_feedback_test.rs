//! Process-wide capture at trace level with a live observer.
//!
//! Installs the global subscriber, so it lives in its own test binary.

use std::time::Duration;

use devtrace::config::ObservabilityConfig;
use devtrace::console::without_capture;
use devtrace::observability::logging::init_logging;
use devtrace::store::{LogLevel, LogQuery};
use devtrace::DevTraceConfig;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_log_line_yields_one_push_at_trace_level() {
    let running = common::start(DevTraceConfig::default()).await;
    let (mut socket, _) = common::observe(running.addr).await;

    let config = ObservabilityConfig {
        log_level: "trace".to_string(),
    };
    init_logging(&config, Some(running.devtrace.capture_layer())).unwrap();

    running.devtrace.log(LogLevel::Info, "one line", None);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let logs = running.devtrace.logs().get_logs(&LogQuery::default());
    let messages: Vec<_> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, ["one line"]);
    assert_eq!(running.devtrace.client_count(), 1);

    // the test's own client also speaks tungstenite; keep its reads out of capture
    let push = without_capture(common::next_frame(&mut socket)).await.unwrap();
    assert_eq!(push["method"], "log.entry");
    assert_eq!(push["params"]["message"], "one line");

    let extra = without_capture(tokio::time::timeout(
        Duration::from_millis(200),
        common::next_frame(&mut socket),
    ))
    .await;
    assert!(extra.is_err(), "unexpected frame: {extra:?}");

    without_capture(async {
        running.shutdown.trigger();
        let _ = running.server.await;
    })
    .await;
}
