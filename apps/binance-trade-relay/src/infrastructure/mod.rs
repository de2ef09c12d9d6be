//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the ports defined in the application layer,
//! plus the process-level concerns (configuration, telemetry, health).

/// Binance websocket connection, codec and producers.
pub mod binance;

/// Output sinks: re-publish channel and bridge mode.
pub mod broadcast;

/// Environment configuration.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing setup.
pub mod telemetry;
