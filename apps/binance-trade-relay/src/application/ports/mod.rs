//! Port Interfaces
//!
//! Defines the interfaces (ports) the relay core depends on. Infrastructure
//! adapters implement them; tests substitute mocks.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FrameReader`: read half of the exchange connection
//! - `CloseHandshake`: close-frame and teardown half of the exchange connection
//! - `TradeSink`: destination for accepted trades
//!
//! ## Driver Ports (Inbound)
//!
//! - `TradeProducer`: anything that fills the trade queue

use async_trait::async_trait;

use crate::application::queue::TradeQueueSender;
use crate::domain::shutdown::TerminationSignal;
use crate::domain::trade::TradeEnvelope;

// =============================================================================
// Errors
// =============================================================================

/// Transport-level failures on the exchange connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Reading the next frame failed; the connection is no longer readable.
    #[error("error while reading: {0}")]
    Read(String),

    /// Writing a frame failed.
    #[error("error while writing: {0}")]
    Write(String),
}

/// Output sink failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Payload could not be encoded.
    #[error("failed to encode {stream}: {reason}")]
    Encode {
        /// Stream identifier of the rejected envelope.
        stream: String,
        /// Encoder message.
        reason: String,
    },

    /// Sink rejected the write.
    #[error("failed to write {stream}: {source}")]
    Write {
        /// Stream identifier of the rejected envelope.
        stream: String,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// Sink is closed.
    #[error("sink closed")]
    Closed,
}

// =============================================================================
// Connection Ports
// =============================================================================

/// Blocking read of one frame from the exchange connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameReader: Send {
    /// Read the next data frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Read`] on any transport failure, including a
    /// peer close. The reader must not be used again afterwards.
    async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Close side of the exchange connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloseHandshake: Send + Sync {
    /// Send a normal-closure close frame with an empty reason.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Write`] if the frame could not be sent.
    async fn send_close(&self) -> Result<(), TransportError>;

    /// Release the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Implementations return `Ok(())` for every call after the first.
    async fn close(&self) -> Result<(), TransportError>;
}

// =============================================================================
// Output Sink
// =============================================================================

/// Output mode label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Re-publish channel for in-process consumers.
    Broadcast,
    /// Write back onto the exchange connection.
    Bridge,
}

impl OutputMode {
    /// Parse output mode from string, defaulting to broadcast.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "bridge" => Self::Bridge,
            _ => Self::Broadcast,
        }
    }

    /// Mode name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Bridge => "bridge",
        }
    }
}

/// Destination for accepted trades.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeSink: Send + Sync {
    /// Publish one accepted trade.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the dispatcher; it is not retried.
    async fn publish(&self, envelope: TradeEnvelope) -> Result<(), SinkError>;

    /// Output mode implemented by this sink.
    fn mode(&self) -> OutputMode;
}

// =============================================================================
// Producer
// =============================================================================

/// Producer variant label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerKind {
    /// Reads the exchange connection.
    Live,
    /// Emits a fixed trade on a timer.
    Synthetic,
}

impl ProducerKind {
    /// Parse producer kind from string, defaulting to live.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "synthetic" => Self::Synthetic,
            _ => Self::Live,
        }
    }

    /// Producer name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Synthetic => "synthetic",
        }
    }
}

/// Fills the trade queue until the termination signal fires.
///
/// Both variants share the same queue contract, so the dispatcher and the
/// shutdown coordinator never know which one is running.
#[async_trait]
pub trait TradeProducer: Send {
    /// Which variant this is.
    fn kind(&self) -> ProducerKind;

    /// Run the production loop.
    ///
    /// Must return promptly once `signal` fires.
    async fn run(self: Box<Self>, queue: TradeQueueSender, signal: TerminationSignal);
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("bridge", OutputMode::Bridge ; "bridge")]
    #[test_case("BRIDGE", OutputMode::Bridge ; "bridge uppercase")]
    #[test_case("broadcast", OutputMode::Broadcast ; "broadcast")]
    #[test_case("anything", OutputMode::Broadcast ; "unknown")]
    fn output_mode_parsing(raw: &str, expected: OutputMode) {
        assert_eq!(OutputMode::from_str_case_insensitive(raw), expected);
    }

    #[test_case("synthetic", ProducerKind::Synthetic ; "synthetic")]
    #[test_case(" Synthetic ", ProducerKind::Synthetic ; "padded")]
    #[test_case("live", ProducerKind::Live ; "live")]
    #[test_case("", ProducerKind::Live ; "empty")]
    fn producer_kind_parsing(raw: &str, expected: ProducerKind) {
        assert_eq!(ProducerKind::from_str_case_insensitive(raw), expected);
    }

    #[test]
    fn error_messages_name_the_phase() {
        let err = SinkError::Write {
            stream: "BNBBTC@trade".to_string(),
            source: TransportError::Write("broken pipe".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to write BNBBTC@trade: error while writing: broken pipe"
        );
    }
}
