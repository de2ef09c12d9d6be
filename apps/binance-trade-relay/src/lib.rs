#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::items_after_statements,
        clippy::unnecessary_wraps
    )
)]

//! Binance Trade Relay - Trade Stream Ingestion
//!
//! Maintains a single websocket connection to Binance's combined trade
//! stream, filters the incoming trades against an allow-list of symbols and
//! forwards the survivors, either to in-process consumers or back onto the
//! connection. Shutdown is coordinated so that a local interrupt performs a
//! bounded close handshake and a remote failure stops the pipeline without
//! one.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Trade payloads and relay primitives
//!   - `trade`: Trade events and stream envelopes
//!   - `symbols`: The allow-list and its validation rules
//!   - `shutdown`: Termination signal, reasons and phases
//!
//! - **Application**: Ports and the relay pipeline
//!   - `ports`: Frame reader, close handshake, producer and sink traits
//!   - `queue`: Bounded trade queue
//!   - `services`: Dispatcher, shutdown coordinator, relay run loop
//!
//! - **Infrastructure**: Adapters and process concerns
//!   - `binance`: Websocket connection, codec, live/synthetic producers
//!   - `broadcast`: Re-publish channel and bridge-mode sink
//!   - `config`, `telemetry`, `metrics`, `health`
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────┐    ┌────────────┐    ┌────────────┐
//! Binance WS ──────► │ Producer │──► │ TradeQueue │──► │ Dispatcher │──► TradeSink
//!   (or timer)       └──────────┘    └────────────┘    └────────────┘     │
//!                                                        ▲ allow-list     ├─► BroadcastHub
//!                                                                         └─► Binance WS
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay types with no I/O dependencies.
pub mod domain;

/// Application layer - Ports, queue and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::shutdown::{ShutdownPhase, ShutdownReason, TerminationSignal};
pub use domain::symbols::{AllowedSymbolSet, MAX_STREAMS, SymbolSetError};
pub use domain::trade::{DecimalString, InvalidDecimal, StreamEnvelope, TradeEnvelope, TradeEvent};

// Ports
pub use application::ports::{
    CloseHandshake, FrameReader, OutputMode, ProducerKind, SinkError, TradeProducer, TradeSink,
    TransportError,
};

// Relay
pub use application::queue::{QueueError, TradeQueue, TradeQueueReceiver, TradeQueueSender};
pub use application::services::{
    CloseOutcome, DispatchError, Dispatcher, RelayError, RelayHandle, RelayReport, RelaySettings,
    TradeRelay,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, RelayConfig, ServerSettings};

// Exchange adapters
pub use infrastructure::binance::{
    ConnectionError, ConnectionManager, JsonCodec, LiveProducer, StreamEndpoint, SyntheticProducer,
};

// Output sinks
pub use infrastructure::broadcast::{BroadcastConfig, BroadcastHub, ConnectionSink, SharedBroadcastHub};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
