//! Synthetic Producer
//!
//! Emits one fixed `BNBBTC` trade per tick without touching the network.
//! Useful for exercising the dispatcher and output sinks offline.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::ports::{ProducerKind, TradeProducer};
use crate::application::queue::TradeQueueSender;
use crate::domain::shutdown::TerminationSignal;
use crate::domain::trade::{TRADE_EVENT_TYPE, TradeEvent};

/// Default tick interval.
pub const DEFAULT_SYNTHETIC_INTERVAL: Duration = Duration::from_secs(1);

/// Timer-driven producer of a fixed trade.
#[derive(Debug, Clone)]
pub struct SyntheticProducer {
    interval: Duration,
}

impl Default for SyntheticProducer {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTHETIC_INTERVAL)
    }
}

impl SyntheticProducer {
    /// Create a producer ticking every `interval` (at least 1 ms).
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// The event pushed on every tick.
    #[must_use]
    pub fn fixed_event() -> TradeEvent {
        TradeEvent {
            event_type: TRADE_EVENT_TYPE.to_string(),
            event_time: 123_456_789,
            symbol: "BNBBTC".to_string(),
            trade_id: 12345,
            price: Decimal::new(1, 3).into(),
            quantity: Decimal::from(100).into(),
            buyer_order_id: 88,
            seller_order_id: 50,
            trade_time: 123_456_785,
            is_buyer_maker: true,
            ignore: true,
        }
    }
}

#[async_trait]
impl TradeProducer for SyntheticProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Synthetic
    }

    async fn run(self: Box<Self>, queue: TradeQueueSender, signal: TerminationSignal) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                () = signal.fired() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;

                () = signal.fired() => break,
                pushed = queue.push(Self::fixed_event()) => {
                    if pushed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Synthetic producer stopped");
    }
}
