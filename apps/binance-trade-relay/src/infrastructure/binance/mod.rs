//! Binance Websocket Adapters
//!
//! - **Connection**: the single combined-stream websocket (tokio-tungstenite)
//! - **Codec**: JSON envelopes for trade frames
//! - **Endpoint**: combined-stream URL builder
//! - **Producers**: live (socket-backed) and synthetic (timer-backed)

pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod live;
pub mod synthetic;

pub use codec::{CodecError, JsonCodec};
pub use connection::{ConnectionError, ConnectionManager, WsFrameReader};
pub use endpoint::{DEFAULT_STREAM_HOST, StreamEndpoint};
pub use live::LiveProducer;
pub use synthetic::{DEFAULT_SYNTHETIC_INTERVAL, SyntheticProducer};
