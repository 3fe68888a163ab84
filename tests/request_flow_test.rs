//! Host-side request flows: traces, spans and logs without a network.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;

use devtrace::console::LogArg;
use devtrace::store::{LogLevel, LogQuery, TraceQuery};
use devtrace::{current_trace_id, spawn_traced, DevTrace, DevTraceConfig};

fn devtrace(max_traces: usize, max_logs: usize) -> Arc<DevTrace> {
    let mut config = DevTraceConfig::default();
    config.store.max_traces = max_traces;
    config.store.max_logs = max_logs;
    Arc::new(DevTrace::new(config))
}

/// One simulated request: logs at both ends, a nested span in between.
async fn handle(devtrace: Arc<DevTrace>, path: String, delay_ms: u64) -> String {
    let trace = devtrace.create_trace("GET", &path);
    devtrace.add_context(&trace.id, "path", path.clone());
    let spans = devtrace.spans(trace.id.clone());

    devtrace
        .run_with_trace(trace.id.clone(), async {
            devtrace.console().info(&[LogArg::from("start"), LogArg::from(path.as_str())]);
            let root = spans.start("handler", None);
            spans
                .measure("db.query", Some(&root.id), async {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                })
                .await;
            devtrace.log(LogLevel::Info, format!("done {path}"), None);
            spans.end(&root.id);
        })
        .await;

    devtrace.complete_trace(&trace.id, 200, delay_ms as f64);
    trace.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_keep_their_own_logs() {
    let devtrace = devtrace(100, 1000);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let devtrace = devtrace.clone();
            tokio::spawn(handle(devtrace, format!("/item/{i}"), 20 - i * 2))
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    for (i, id) in ids.iter().enumerate() {
        let trace = devtrace.traces().get_trace(id).unwrap();
        assert_eq!(trace.status_code, Some(200));
        assert_eq!(trace.logs.len(), 2, "trace {i} picked up foreign logs");
        for log in &trace.logs {
            assert_eq!(log.trace_id.as_deref(), Some(id.as_str()));
            assert_eq!(log.context.as_ref().unwrap()["path"], json!(format!("/item/{i}")));
        }
        assert_eq!(trace.logs[0].message, format!("start /item/{i}"));

        let names: Vec<_> = trace.spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["db.query", "handler"]);
        assert_eq!(trace.spans[0].parent_id.as_deref(), Some(trace.spans[1].id.as_str()));
    }

    assert_eq!(devtrace.tracer().active_count(), 0);
    assert_eq!(devtrace.logs().len(), 16);
    assert!(current_trace_id().is_none());
}

#[tokio::test]
async fn trace_store_evicts_oldest_first() {
    let devtrace = devtrace(2, 100);
    let t1 = devtrace.create_trace("GET", "/1");
    let t2 = devtrace.create_trace("GET", "/2");
    let t3 = devtrace.create_trace("POST", "/3");

    let ids: Vec<_> = devtrace
        .traces()
        .get_all_traces()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, [t3.id.clone(), t2.id.clone()]);
    assert!(devtrace.traces().get_trace(&t1.id).is_none());

    // logs under an evicted trace are stored but untagged
    devtrace
        .run_with_trace(t1.id.clone(), async {
            devtrace.log(LogLevel::Error, "late", None);
        })
        .await;
    let logs = devtrace.logs().get_logs(&LogQuery::default());
    assert_eq!(logs[0].trace_id, None);

    let posts = devtrace.traces().get_traces(&TraceQuery {
        method: Some("POST".into()),
        ..TraceQuery::default()
    });
    assert_eq!(posts.len(), 1);
    let lowercase = devtrace.traces().get_traces(&TraceQuery {
        method: Some("post".into()),
        ..TraceQuery::default()
    });
    assert!(lowercase.is_empty());
}

#[tokio::test]
async fn failed_span_is_recorded_and_error_returned() {
    let devtrace = devtrace(10, 10);
    let trace = devtrace.create_trace("GET", "/fail");
    let spans = devtrace.spans(trace.id.clone());

    let result: Result<(), String> = spans
        .run("payment.charge", None, async { Err("card declined".to_string()) })
        .await;
    assert_eq!(result, Err("card declined".to_string()));

    let stored = devtrace.traces().get_trace(&trace.id).unwrap();
    let span = &stored.spans[0];
    assert_eq!(span.attributes["error"], json!(true));
    assert_eq!(span.attributes["error.message"], json!("card declined"));
    assert!(span.end_time.is_some());
}

#[tokio::test]
async fn spawned_work_inherits_the_trace() {
    let devtrace = devtrace(10, 10);
    let trace = devtrace.create_trace("GET", "/bg");

    let inner = devtrace.clone();
    let seen = devtrace
        .run_with_trace(trace.id.clone(), async move {
            spawn_traced(async move {
                inner.log(LogLevel::Debug, "from background", None);
                current_trace_id()
            })
            .await
            .unwrap()
        })
        .await;

    assert_eq!(seen.as_deref(), Some(trace.id.as_str()));
    let stored = devtrace.traces().get_trace(&trace.id).unwrap();
    assert_eq!(stored.logs[0].message, "from background");
}

#[test]
fn tracing_events_are_captured_with_the_ambient_trace() {
    let devtrace = devtrace(10, 10);
    let trace = devtrace.create_trace("GET", "/tracing");
    let subscriber = tracing_subscriber::registry().with(devtrace.capture_layer());

    tracing::subscriber::with_default(subscriber, || {
        devtrace::context::run_with_trace_sync(trace.id.clone(), || {
            tracing::warn!(target: "app", user = 7, "quota exceeded");
        });
        tracing::info!(target: "app", "outside any request");
    });

    let logs = devtrace.logs().get_logs(&LogQuery::default());
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1].level, LogLevel::Warn);
    assert!(logs[1].message.starts_with("quota exceeded"));
    assert_eq!(logs[1].args.as_ref().unwrap()[1], json!({"user": 7}));
    assert_eq!(logs[1].trace_id.as_deref(), Some(trace.id.as_str()));
    assert_eq!(logs[0].trace_id, None);

    let filtered = devtrace.logs().get_logs(&LogQuery {
        search: Some("QUOTA".into()),
        ..LogQuery::default()
    });
    assert_eq!(filtered.len(), 1);
}

#[tokio::test]
async fn uninstalling_restores_the_console() {
    let devtrace = devtrace(10, 10);
    devtrace.console().warn(&[LogArg::from("captured")]);
    assert!(devtrace.interceptor().uninstall());
    devtrace.console().warn(&[LogArg::from("not captured")]);

    let logs = devtrace.logs().get_logs(&LogQuery::default());
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "captured");
}
