//! Configuration Module
//!
//! Environment-driven configuration for the relay process.

mod settings;

pub use settings::{ConfigError, RelayConfig, ServerSettings};
