//! Stream Codec Module
//!
//! JSON encoding and decoding for Binance combined-stream frames.
//!
//! Ingress frames are `{"stream": ..., "data": <trade>}` objects. Egress
//! frames reuse the same envelope with the relayed stream identifier.

use serde::Serialize;

use crate::domain::trade::TradeEnvelope;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not a JSON object.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the combined trade stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into a trade envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not an object or does not match the
    /// trade schema (missing fields, numeric price, wrong types).
    pub fn decode_trade(&self, text: &str) -> Result<TradeEnvelope, CodecError> {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                truncate(trimmed, 50)
            )));
        }

        Ok(serde_json::from_str(trimmed)?)
    }

    /// Decode a raw frame payload.
    ///
    /// # Errors
    ///
    /// Same as [`decode_trade`](Self::decode_trade); invalid UTF-8 is
    /// reported as [`CodecError::InvalidFormat`].
    pub fn decode_trade_bytes(&self, bytes: &[u8]) -> Result<TradeEnvelope, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::InvalidFormat(format!("frame is not UTF-8: {e}")))?;
        self.decode_trade(text)
    }

    /// Encode any serializable payload as a compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    /// Encode as indented JSON, for log output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_pretty<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}
