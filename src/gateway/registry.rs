//! Observer set and notification fan-out.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::gateway::connection::ConnectionId;
use crate::observability::metrics;
use crate::rpc::{Notification, RpcHandler, PROTOCOL_VERSION};

/// Method of the first notification every observer receives.
pub const CONNECTION_ESTABLISHED: &str = "connection.established";

/// Connected observers, each behind a bounded outbound queue.
///
/// A socket writer task drains each queue. Pushes only ever enqueue, so a
/// slow observer costs nothing beyond its own queue; once that is full it
/// is dropped.
pub struct Gateway {
    observers: DashMap<ConnectionId, mpsc::Sender<String>>,
    rpc: Arc<RpcHandler>,
    outbound_buffer: usize,
}

impl Gateway {
    pub fn new(rpc: Arc<RpcHandler>, outbound_buffer: usize) -> Self {
        Self {
            observers: DashMap::new(),
            rpc,
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    /// Register a new observer and hand back the receiving end of its queue.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        (self.attach(tx), rx)
    }

    /// Register an observer's outbound queue and greet it.
    pub fn attach(&self, tx: mpsc::Sender<String>) -> ConnectionId {
        let id = ConnectionId::new();
        let greeting = Notification::new(
            CONNECTION_ESTABLISHED,
            json!({
                "connectionId": id.to_string(),
                "protocolVersion": PROTOCOL_VERSION,
                "version": env!("CARGO_PKG_VERSION"),
            }),
        );
        if tx.try_send(greeting.to_text()).is_err() {
            tracing::debug!(connection_id = %id, "Observer gone before greeting");
            return id;
        }
        self.observers.insert(id, tx);
        metrics::set_observers(self.observers.len());
        tracing::info!(connection_id = %id, observers = self.observers.len(), "Observer connected");
        id
    }

    /// Remove an observer. Safe to call more than once.
    pub fn detach(&self, id: ConnectionId) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            metrics::set_observers(self.observers.len());
            tracing::info!(connection_id = %id, observers = self.observers.len(), "Observer disconnected");
        }
        removed
    }

    /// Push a notification to every observer. Returns how many accepted it.
    pub fn broadcast(&self, event: &str, payload: Value) -> usize {
        let frame = Notification::new(event, payload).to_text();
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for entry in self.observers.iter() {
            match entry.value().try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %entry.key(), event = %event, "Observer queue full, dropping");
                    dropped.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => dropped.push(*entry.key()),
            }
        }

        for id in dropped {
            if self.detach(id) {
                metrics::record_observer_dropped();
            }
        }
        metrics::record_broadcast(event);
        delivered
    }

    /// Dispatch one inbound frame and queue any response on the same
    /// connection. Returns false once the connection is gone.
    pub async fn handle_frame(&self, id: ConnectionId, text: &str) -> bool {
        let Some(reply) = self.rpc.handle_text(text).await else {
            return self.observers.contains_key(&id);
        };
        let sender = self.observers.get(&id).map(|entry| entry.value().clone());
        match sender {
            Some(tx) => tx.send(reply).await.is_ok(),
            None => false,
        }
    }

    /// Drop every observer; their writer tasks close the sockets.
    pub fn disconnect_all(&self) -> usize {
        let ids: Vec<_> = self.observers.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter(|id| self.detach(*id)).count()
    }

    pub fn client_count(&self) -> usize {
        self.observers.len()
    }

    pub fn rpc(&self) -> &Arc<RpcHandler> {
        &self.rpc
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("observers", &self.observers.len())
            .field("outbound_buffer", &self.outbound_buffer)
            .finish()
    }
}
