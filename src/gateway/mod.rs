//! Realtime gateway for dashboard observers.
//!
//! # Data Flow
//! ```text
//! observer ── WebSocket ──→ server.rs serve_observer
//!     → registry.rs attach (bounded queue, "connection.established")
//!     inbound text frame → RpcHandler → response on the same queue
//!     close / read error → detach
//!
//! DevTrace::broadcast(event)
//!     → registry.rs broadcast: try_send to each queue
//!     → full or closed queue → observer dropped
//!     → per-connection writer task drains its queue to the socket
//! ```
//!
//! # Design Decisions
//! - Pushes never await a socket; each observer has its own writer task
//! - Removal is idempotent and also ends the writer task
//! - Liveness check is a plain GET outside the push protocol

pub mod connection;
pub mod registry;
pub mod server;

use thiserror::Error;

pub use connection::ConnectionId;
pub use registry::{Gateway, CONNECTION_ESTABLISHED};
pub use server::{gateway_router, serve_observer, HealthStatus};

/// Errors from running the gateway listener.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The configured address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("gateway server error: {0}")]
    Serve(#[from] std::io::Error),
}
