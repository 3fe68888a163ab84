//! Method dispatch.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use crate::observability::metrics;
use crate::rpc::envelope::{parse_inbound, Inbound, Response, RpcError, INTERNAL_ERROR};
use crate::spans::helper::panic_message;

pub type HandlerFuture = BoxFuture<'static, Result<Value, RpcError>>;
type MethodFn = Arc<dyn Fn(Option<Value>) -> HandlerFuture + Send + Sync>;

/// Dispatch table, filled in as components initialize.
#[derive(Default)]
pub struct RpcHandler {
    methods: DashMap<String, MethodFn>,
}

impl RpcHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an async method handler.
    pub fn register<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        let method = method.into();
        tracing::trace!(method = %method, "RPC method registered");
        self.methods
            .insert(method, Arc::new(move |params| handler(params).boxed()));
    }

    /// Register a synchronous handler. It runs when the call is polled.
    pub fn register_sync<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(method, move |params| {
            let handler = handler.clone();
            async move { handler(params) }
        });
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<_> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Call a method directly. Handler panics become internal errors.
    pub async fn invoke(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let handler = self
            .methods
            .get(method)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RpcError::method_not_found(method))?;

        let outcome = match AssertUnwindSafe(handler(params)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(RpcError::internal(panic_message(panic.as_ref()))),
        };
        metrics::record_rpc_call(method, outcome.is_ok());
        if let Err(err) = &outcome {
            if err.code == INTERNAL_ERROR {
                tracing::warn!(method = %method, error = %err.message, "RPC handler failed");
            }
        }
        outcome
    }

    /// Handle one inbound text frame; `Some` holds the response to send back.
    pub async fn handle_text(&self, text: &str) -> Option<String> {
        let inbound = match parse_inbound(text) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::debug!(error = %err, "Unparsable RPC frame");
                return Some(Response::failure(Value::Null, err).to_text());
            }
        };

        match inbound {
            Inbound::Request(request) => {
                let response = match self.invoke(&request.method, request.params).await {
                    Ok(result) => Response::success(request.id, result),
                    Err(err) => Response::failure(request.id, err),
                };
                Some(response.to_text())
            }
            Inbound::Notification(notification) => {
                if let Err(err) = self.invoke(&notification.method, notification.params).await {
                    tracing::debug!(method = %notification.method, error = %err, "Notification failed");
                }
                None
            }
            Inbound::Invalid { id, reason } => {
                Some(Response::failure(id, RpcError::invalid_request(reason)).to_text())
            }
            Inbound::Response | Inbound::MalformedNotification => None,
        }
    }
}

impl std::fmt::Debug for RpcHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcHandler")
            .field("methods", &self.methods())
            .finish()
    }
}
