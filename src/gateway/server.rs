//! HTTP routes: WebSocket upgrade for observers and the liveness check.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::console::without_capture;
use crate::gateway::registry::Gateway;

/// State injected into the gateway handlers.
#[derive(Clone)]
struct GatewayState {
    gateway: Arc<Gateway>,
    started_at: Instant,
}

/// Liveness report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_ms: u64,
    pub clients: usize,
}

/// Build the gateway's axum router.
pub fn gateway_router(gateway: Arc<Gateway>, config: &GatewayConfig, started_at: Instant) -> Router {
    let state = GatewayState { gateway, started_at };
    Router::new()
        .route(&config.ws_path, get(ws_upgrade))
        .route(&config.health_path, get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<GatewayState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_ms: state.started_at.elapsed().as_millis() as u64,
        clients: state.gateway.client_count(),
    })
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| serve_observer(state.gateway, socket))
}

/// Drive one observer socket until either side goes away.
pub async fn serve_observer(gateway: Arc<Gateway>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(gateway.outbound_buffer());
    let id = gateway.attach(tx);

    // The gateway holds the only sender; removing the observer ends this task.
    // Socket I/O is kept out of log capture so a push never begets a push.
    let writer = tokio::spawn(without_capture(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.into())).await {
                tracing::debug!(connection_id = %id, error = %e, "Observer write failed");
                break;
            }
        }
        let _ = sink.close().await;
    }));

    while let Some(message) = without_capture(stream.next()).await {
        match message {
            Ok(Message::Text(text)) => {
                if !gateway.handle_frame(id, text.as_str()).await {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Observer read failed");
                break;
            }
        }
    }

    gateway.detach(id);
    let _ = writer.await;
}
