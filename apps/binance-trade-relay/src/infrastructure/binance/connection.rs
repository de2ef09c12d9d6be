//! Exchange Connection Manager
//!
//! Owns the single websocket connection to the combined-stream endpoint.
//! After dialing, the stream is split: the read half is handed out once to
//! the live producer, the write half stays here behind a mutex so the close
//! handshake and bridge-mode writes never interleave.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{CloseHandshake, FrameReader, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Error Type
// =============================================================================

/// Errors raised while establishing the connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The websocket handshake failed.
    #[error("failed to dial {url}: {source}")]
    Dial {
        /// Endpoint that was dialed.
        url: String,
        /// Handshake failure.
        #[source]
        source: tungstenite::Error,
    },
}

// =============================================================================
// Frame Reader
// =============================================================================

/// Read half of the exchange connection.
pub struct WsFrameReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                // tungstenite queues the pong reply itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let detail = frame.map_or_else(
                        || "connection closed by peer".to_string(),
                        |f| {
                            format!(
                                "connection closed by peer ({}): {}",
                                u16::from(f.code),
                                f.reason.as_str()
                            )
                        },
                    );
                    return Err(TransportError::Read(detail));
                }
                Some(Err(e)) => return Err(TransportError::Read(e.to_string())),
                None => return Err(TransportError::Read("stream ended".to_string())),
            }
        }
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// The one connection to the exchange.
pub struct ConnectionManager {
    url: String,
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: parking_lot::Mutex<Option<WsFrameReader>>,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Open the websocket connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Dial`] if the handshake fails. There is no
    /// retry.
    pub async fn dial(url: &str) -> Result<Self, ConnectionError> {
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|source| {
                    tracing::error!(url, error = %source, "Failed to dial exchange");
                    ConnectionError::Dial {
                        url: url.to_string(),
                        source,
                    }
                })?;

        tracing::debug!(url, "Websocket connected");

        let (write, read) = ws_stream.split();

        Ok(Self {
            url: url.to_string(),
            writer: Mutex::new(write),
            reader: parking_lot::Mutex::new(Some(WsFrameReader { stream: read })),
            closed: AtomicBool::new(false),
        })
    }

    /// Dialed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hand out the read half. Returns `None` after the first call.
    #[must_use]
    pub fn take_reader(&self) -> Option<WsFrameReader> {
        self.reader.lock().take()
    }

    /// Whether [`close`](CloseHandshake::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Write`] if the frame cannot be written.
    pub async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

#[async_trait]
impl CloseHandshake for ConnectionManager {
    async fn send_close(&self) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };

        self.writer
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        match self.writer.lock().await.close().await {
            Ok(()) => {
                tracing::debug!(url = %self.url, "Connection released");
                Ok(())
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                tracing::debug!(url = %self.url, "Connection already closed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Connection released uncleanly");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::telemetry::tests::CapturedLogs;

    #[tokio::test]
    async fn dial_failure_names_the_url() {
        // Nothing listens on port 1.
        let Err(err) = ConnectionManager::dial("ws://127.0.0.1:1/stream?streams=bnbbtc@trade").await
        else {
            panic!("dial should fail");
        };

        let ConnectionError::Dial { url, .. } = &err;
        assert_eq!(url, "ws://127.0.0.1:1/stream?streams=bnbbtc@trade");
        assert!(err.to_string().starts_with("failed to dial ws://127.0.0.1:1"));
    }

    #[tokio::test]
    async fn dial_failure_is_logged() {
        let logs = CapturedLogs::default();
        let _guard = tracing::dispatcher::set_default(&logs.subscriber());

        assert!(ConnectionManager::dial("ws://127.0.0.1:1/stream?streams=bnbbtc@trade")
            .await
            .is_err());

        let output = logs.contents();
        assert!(output.contains("ERROR"));
        assert!(output.contains("Failed to dial exchange"));
        assert!(output.contains("ws://127.0.0.1:1"));
    }

    #[tokio::test]
    async fn dial_rejects_malformed_url() {
        assert!(ConnectionManager::dial("not a url").await.is_err());
    }
}
