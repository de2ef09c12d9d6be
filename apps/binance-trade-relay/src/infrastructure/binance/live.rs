//! Live Producer
//!
//! Reads frames from the exchange connection, decodes them and pushes the
//! trades onto the queue. A malformed frame is logged and skipped; a read
//! failure ends production and fires the termination signal.

use async_trait::async_trait;

use super::codec::JsonCodec;
use crate::application::ports::{FrameReader, ProducerKind, TradeProducer};
use crate::application::queue::TradeQueueSender;
use crate::domain::shutdown::{ShutdownReason, TerminationSignal};
use crate::infrastructure::metrics;

/// Producer backed by the exchange connection.
pub struct LiveProducer {
    reader: Box<dyn FrameReader>,
    codec: JsonCodec,
}

impl LiveProducer {
    /// Create a producer over a frame reader.
    #[must_use]
    pub fn new(reader: Box<dyn FrameReader>) -> Self {
        Self {
            reader,
            codec: JsonCodec::new(),
        }
    }
}

#[async_trait]
impl TradeProducer for LiveProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Live
    }

    async fn run(mut self: Box<Self>, queue: TradeQueueSender, signal: TerminationSignal) {
        loop {
            let frame = tokio::select! {
                biased;

                () = signal.fired() => {
                    tracing::debug!("Live producer stopped by termination signal");
                    return;
                }
                frame = self.reader.read_frame() => frame,
            };

            let bytes = match frame {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "Stopped reading from socket");
                    signal.fire(ShutdownReason::TransportFailure);
                    return;
                }
            };

            metrics::record_frame_received();

            let envelope = match self.codec.decode_trade_bytes(&bytes) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(
                        raw = %String::from_utf8_lossy(&bytes),
                        error = %e,
                        "Failed to decode trade frame"
                    );
                    metrics::record_decode_error();
                    continue;
                }
            };

            tracing::trace!(stream = %envelope.stream, trade_id = envelope.data.trade_id, "Trade received");

            tokio::select! {
                biased;

                () = signal.fired() => return,
                pushed = queue.push(envelope.data) => {
                    if pushed.is_err() {
                        tracing::debug!("Trade queue closed, live producer exiting");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::*;
    use crate::application::ports::{MockFrameReader, TransportError};
    use crate::application::queue::TradeQueue;

    const FRAME: &str = r#"{"stream":"bnbbtc@trade","data":{"e":"trade","E":1,"s":"BNBBTC","t":7,"p":"0.001","q":"100","b":88,"a":50,"T":1,"m":true,"M":true}}"#;

    fn scripted_reader(frames: Vec<Result<&'static str, TransportError>>) -> Box<MockFrameReader> {
        let mut frames: VecDeque<_> = frames.into_iter().collect();
        let mut reader = MockFrameReader::new();
        reader.expect_read_frame().returning(move || {
            frames.pop_front().map_or_else(
                || Err(TransportError::Read("stream ended".to_string())),
                |frame| frame.map(|text| text.as_bytes().to_vec()),
            )
        });
        Box::new(reader)
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped() {
        let reader = scripted_reader(vec![Ok("{garbage"), Ok(FRAME)]);
        let (tx, mut rx) = TradeQueue::bounded(4);
        let signal = TerminationSignal::new();

        Box::new(LiveProducer::new(reader))
            .run(tx, signal.clone())
            .await;

        let trade = rx.recv().await.unwrap();
        assert_eq!(trade.trade_id, 7);
        assert!(rx.recv().await.is_none());
        assert_eq!(signal.reason(), Some(ShutdownReason::TransportFailure));
    }

    #[tokio::test]
    async fn read_error_fires_transport_failure() {
        let reader = scripted_reader(vec![Err(TransportError::Read("reset".to_string()))]);
        let (tx, _rx) = TradeQueue::bounded(4);
        let signal = TerminationSignal::new();

        Box::new(LiveProducer::new(reader))
            .run(tx, signal.clone())
            .await;

        assert!(signal.is_fired());
        assert_eq!(signal.reason(), Some(ShutdownReason::TransportFailure));
    }

    #[tokio::test]
    async fn fired_signal_stops_a_stalled_push() {
        let reader = scripted_reader(vec![Ok(FRAME), Ok(FRAME)]);
        let (tx, _rx) = TradeQueue::bounded(1);
        let signal = TerminationSignal::new();

        let task = tokio::spawn(Box::new(LiveProducer::new(reader)).run(tx, signal.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.fire(ShutdownReason::Interrupted);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.reason(), Some(ShutdownReason::Interrupted));
    }

    #[test]
    fn reports_live_kind() {
        let producer = LiveProducer::new(Box::new(MockFrameReader::new()));
        assert_eq!(producer.kind(), ProducerKind::Live);
    }
}
