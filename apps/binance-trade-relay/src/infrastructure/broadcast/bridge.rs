//! Bridge-mode sink: writes accepted trades back onto the exchange
//! connection as JSON text frames.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{OutputMode, SinkError, TradeSink};
use crate::domain::trade::TradeEnvelope;
use crate::infrastructure::binance::{ConnectionManager, JsonCodec};

/// Sink that echoes envelopes onto the connection.
pub struct ConnectionSink {
    connection: Arc<ConnectionManager>,
    codec: JsonCodec,
}

impl ConnectionSink {
    /// Create a sink writing to `connection`.
    #[must_use]
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self {
            connection,
            codec: JsonCodec::new(),
        }
    }
}

#[async_trait]
impl TradeSink for ConnectionSink {
    async fn publish(&self, envelope: TradeEnvelope) -> Result<(), SinkError> {
        let text = self.codec.encode(&envelope).map_err(|e| SinkError::Encode {
            stream: envelope.stream.clone(),
            reason: e.to_string(),
        })?;

        self.connection
            .send_text(text)
            .await
            .map_err(|source| SinkError::Write {
                stream: envelope.stream,
                source,
            })
    }

    fn mode(&self) -> OutputMode {
        OutputMode::Bridge
    }
}
