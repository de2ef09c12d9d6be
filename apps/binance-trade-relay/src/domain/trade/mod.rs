//! Trade Stream Payloads
//!
//! Wire shapes for Binance combined-stream trade frames. These types map
//! directly to the JSON schema of the `<symbol>@trade` stream.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "stream": "bnbbtc@trade",
//!   "data": {
//!     "e": "trade", "E": 123456789, "s": "BNBBTC", "t": 12345,
//!     "p": "0.001", "q": "100", "b": 88, "a": 50, "T": 123456785,
//!     "m": true, "M": true
//!   }
//! }
//! ```
//!
//! Price and quantity travel as decimal strings. They are validated on
//! decode and held as [`DecimalString`], which writes back the exact text it
//! arrived with, so a relayed frame keeps every digit (including trailing
//! zeros and precision beyond what [`Decimal`] can hold).

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event type tag carried by every trade payload.
pub const TRADE_EVENT_TYPE: &str = "trade";

// =============================================================================
// Trade Event
// =============================================================================

/// A single decoded exchange trade.
///
/// Immutable once decoded; the dispatcher consumes it by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Event type (expected to be `"trade"`).
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time in milliseconds (exchange clock).
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Exchange ticker, e.g. `BNBBTC`.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Trade identifier.
    #[serde(rename = "t")]
    pub trade_id: i64,

    /// Trade price.
    #[serde(rename = "p")]
    pub price: DecimalString,

    /// Trade quantity.
    #[serde(rename = "q")]
    pub quantity: DecimalString,

    /// Buyer order identifier.
    #[serde(rename = "b")]
    pub buyer_order_id: i64,

    /// Seller order identifier.
    #[serde(rename = "a")]
    pub seller_order_id: i64,

    /// Trade time in milliseconds (exchange clock).
    #[serde(rename = "T")]
    pub trade_time: i64,

    /// Whether the buyer was the liquidity maker.
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,

    /// Reserved by the exchange; carried through untouched.
    #[serde(rename = "M")]
    pub ignore: bool,
}

impl TradeEvent {
    /// Check whether this payload carries the `trade` event type.
    #[must_use]
    pub fn is_trade(&self) -> bool {
        self.event_type == TRADE_EVENT_TYPE
    }

    /// Stream identifier for this event, keeping the symbol's original case.
    #[must_use]
    pub fn stream_id(&self) -> String {
        stream_id(&self.symbol, &self.event_type)
    }
}

// =============================================================================
// Decimal Strings
// =============================================================================

/// A decimal number kept as its exact wire text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DecimalString(String);

/// Text that is not a plain decimal number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal string: {0:?}")]
pub struct InvalidDecimal(pub String);

impl DecimalString {
    /// The wire text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, or `None` if it does not fit a [`Decimal`] exactly.
    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        Decimal::from_str_exact(&self.0).ok()
    }
}

/// Accepts `-?digits(.digits)?`.
fn is_decimal_text(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.is_none_or(all_digits)
}

impl FromStr for DecimalString {
    type Err = InvalidDecimal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_decimal_text(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidDecimal(s.to_string()))
        }
    }
}

impl TryFrom<String> for DecimalString {
    type Error = InvalidDecimal;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_decimal_text(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidDecimal(value))
        }
    }
}

impl From<DecimalString> for String {
    fn from(value: DecimalString) -> Self {
        value.0
    }
}

impl From<Decimal> for DecimalString {
    fn from(value: Decimal) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DecimalString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Stream Envelope
// =============================================================================

/// Combined-stream wrapper pairing a stream identifier with its payload.
///
/// Ingress frames carry a [`TradeEvent`]; egress frames may carry any
/// serializable payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEnvelope<T> {
    /// Stream identifier, `<symbol>@<eventType>`.
    pub stream: String,

    /// Stream payload.
    pub data: T,
}

impl<T> StreamEnvelope<T> {
    /// Wrap a payload.
    #[must_use]
    pub fn new(stream: impl Into<String>, data: T) -> Self {
        Self {
            stream: stream.into(),
            data,
        }
    }
}

impl StreamEnvelope<TradeEvent> {
    /// Wrap a trade under its own stream identifier.
    #[must_use]
    pub fn for_trade(trade: TradeEvent) -> Self {
        Self::new(trade.stream_id(), trade)
    }
}

/// Ingress frame shape.
pub type TradeEnvelope = StreamEnvelope<TradeEvent>;

// =============================================================================
// Stream Identifiers
// =============================================================================

/// Format a stream identifier without touching the symbol's case.
#[must_use]
pub fn stream_id(symbol: &str, event_type: &str) -> String {
    format!("{symbol}@{event_type}")
}

/// Format the subscription form of a stream identifier (lowercase symbol).
#[must_use]
pub fn subscription_stream_id(symbol: &str, event_type: &str) -> String {
    stream_id(&symbol.to_lowercase(), event_type)
}
