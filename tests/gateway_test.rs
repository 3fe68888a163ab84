//! End-to-end tests of the observer gateway over real sockets.

use serde_json::{json, Value};

use devtrace::rpc::{Request, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use devtrace::store::LogLevel;
use devtrace::DevTraceConfig;

mod common;

#[tokio::test]
async fn observer_is_greeted_and_can_query() {
    let running = common::start(DevTraceConfig::default()).await;
    let (mut socket, greeting) = common::observe(running.addr).await;

    assert_eq!(greeting["method"], "connection.established");
    assert_eq!(greeting["protocolVersion"], "1.0");
    assert!(greeting["params"]["connectionId"].is_string());

    let trace = running.devtrace.create_trace("GET", "/users");
    running.devtrace.complete_trace(&trace.id, 200, 12.0);

    // the completion push arrives before the response to a later request
    let push = common::next_frame(&mut socket).await.unwrap();
    assert_eq!(push["method"], "trace.new");
    assert_eq!(push["params"]["id"], json!(trace.id));

    common::send_text(&mut socket, Request::new(1, "traces/list", None).to_text()).await;
    let response = common::next_response(&mut socket).await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"].as_array().unwrap().len(), 1);

    common::send_text(&mut socket, Request::new("s", "status", None).to_text()).await;
    let status = common::next_response(&mut socket).await;
    assert_eq!(status["id"], "s");
    assert_eq!(status["result"]["traceCount"], 1);
    assert_eq!(status["result"]["clientCount"], 1);

    running.shutdown.trigger();
}

#[tokio::test]
async fn protocol_errors_are_reported_per_request() {
    let running = common::start(DevTraceConfig::default()).await;
    let (mut socket, _) = common::observe(running.addr).await;

    common::send_text(&mut socket, "{not json".to_string()).await;
    let response = common::next_response(&mut socket).await;
    assert_eq!(response["error"]["code"], PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);

    common::send_text(&mut socket, Request::new(2, "nope", None).to_text()).await;
    let response = common::next_response(&mut socket).await;
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    assert_eq!(response["id"], 2);

    common::send_text(&mut socket, Request::new(3, "traces/get", None).to_text()).await;
    let response = common::next_response(&mut socket).await;
    assert_eq!(response["error"]["code"], INVALID_PARAMS);

    // connection survives every error
    common::send_text(&mut socket, Request::new(4, "traces/get", Some(json!({"id": "missing"}))).to_text()).await;
    let response = common::next_response(&mut socket).await;
    assert_eq!(response["id"], 4);
    assert_eq!(response["result"], Value::Null);

    running.shutdown.trigger();
}

#[tokio::test]
async fn log_entries_are_pushed_to_every_observer() {
    let running = common::start(DevTraceConfig::default()).await;
    let (mut first, _) = common::observe(running.addr).await;
    let (mut second, _) = common::observe(running.addr).await;

    running.devtrace.log(LogLevel::Warn, "disk almost full", None);

    for socket in [&mut first, &mut second] {
        let push = common::next_frame(socket).await.unwrap();
        assert_eq!(push["method"], "log.entry");
        assert_eq!(push["params"]["level"], "warn");
        assert_eq!(push["params"]["message"], "disk almost full");
    }

    running.shutdown.trigger();
}

#[tokio::test]
async fn health_reports_connected_observers() {
    let running = common::start(DevTraceConfig::default()).await;
    let url = format!("http://{}/health", running.addr);

    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["clients"], 0);

    let (socket, _) = common::observe(running.addr).await;
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["clients"], 1);

    drop(socket);
    let devtrace = running.devtrace.clone();
    common::eventually(move || devtrace.client_count() == 0).await;

    running.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_notifies_and_closes_observers() {
    let running = common::start(DevTraceConfig::default()).await;
    let (mut socket, _) = common::observe(running.addr).await;

    running.shutdown.trigger();

    let stopped = common::next_frame(&mut socket).await.unwrap();
    assert_eq!(stopped["method"], "app.stopped");
    assert!(common::next_frame(&mut socket).await.is_none());

    running.server.await.unwrap();
    assert_eq!(running.devtrace.client_count(), 0);
}
