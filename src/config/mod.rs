//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DevTraceConfig (validated, immutable)
//!     → DevTrace::new sizes the stores and gateway from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{CaptureConfig, DevTraceConfig, GatewayConfig, ObservabilityConfig, StoreConfig};
pub use validation::{validate_config, ValidationError};
