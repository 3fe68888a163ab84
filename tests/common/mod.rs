//! Shared helpers for gateway integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use devtrace::{DevTrace, DevTraceConfig, Shutdown};

pub type Observer = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A DevTrace instance serving on an ephemeral port.
pub struct Running {
    pub devtrace: Arc<DevTrace>,
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub server: tokio::task::JoinHandle<()>,
}

pub async fn start(config: DevTraceConfig) -> Running {
    let devtrace = Arc::new(DevTrace::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    let serving = devtrace.clone();
    let server = tokio::spawn(async move {
        serving.serve(listener, rx).await.unwrap();
    });

    Running {
        devtrace,
        addr,
        shutdown,
        server,
    }
}

/// Connect an observer and consume its greeting.
#[allow(dead_code)]
pub async fn observe(addr: SocketAddr) -> (Observer, Value) {
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let greeting = next_frame(&mut socket).await.unwrap();
    (socket, greeting)
}

/// Next text frame as JSON, or `None` once the socket closes.
pub async fn next_frame(socket: &mut Observer) -> Option<Value> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")?;
        match message {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Next frame that is not a push notification.
#[allow(dead_code)]
pub async fn next_response(socket: &mut Observer) -> Value {
    loop {
        let frame = next_frame(socket).await.expect("socket closed");
        if frame.get("method").is_none() {
            return frame;
        }
    }
}

#[allow(dead_code)]
pub async fn send_text(socket: &mut Observer, text: String) {
    socket.send(Message::text(text)).await.unwrap();
}

/// Wait until `check` holds, polling briefly.
#[allow(dead_code)]
pub async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
