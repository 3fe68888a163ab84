//! Request/notification/response protocol.
//!
//! # Data Flow
//! ```text
//! text frame
//!     → envelope.rs parse_inbound
//!         unparsable          → error response (-32700, id null)
//!         id + method         → handler.rs dispatch → exactly one response
//!         id, no method       → error response (-32600)
//!         no id               → notification: run, never answer
//!     → methods.rs core table (status, traces/*, logs/*)
//! ```
//!
//! # Design Decisions
//! - Handlers return `Result`; errors and panics both become error responses
//! - The dispatch table accepts registrations at any time before first use

pub mod envelope;
pub mod handler;
pub mod methods;

pub use envelope::{
    parse_inbound, Inbound, Notification, Request, Response, RpcError, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
pub use handler::{HandlerFuture, RpcHandler};
pub use methods::{register_core_methods, ClientCounter, CoreState};
