//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (DevTrace::serve):
//!     bind listener → serve routes → broadcast "app.started"
//!
//! Shutdown (shutdown.rs):
//!     Signal received → trigger → stop accepting → broadcast "app.stopped"
//!
//! Signals (signals.rs):
//!     Ctrl+C → trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
