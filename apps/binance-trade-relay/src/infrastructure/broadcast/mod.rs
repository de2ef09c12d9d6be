//! Output Sink Adapters
//!
//! - `BroadcastHub`: re-publish mode. Accepted trades go out on a tokio
//!   broadcast channel; any number of in-process consumers subscribe.
//! - `ConnectionSink`: bridge mode. Accepted trades are written back onto
//!   the exchange connection as JSON text frames.

pub mod bridge;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::application::ports::{OutputMode, SinkError, TradeSink};
use crate::domain::trade::TradeEnvelope;
use crate::infrastructure::metrics;

pub use bridge::ConnectionSink;

/// Default re-publish channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 4096;

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Configuration for the re-publish channel.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Messages retained for slow receivers before they lag.
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

/// Re-publish channel for accepted trades.
///
/// # Example
///
/// ```rust
/// use binance_trade_relay::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
///
/// let hub = BroadcastHub::new(BroadcastConfig::default());
/// let rx = hub.subscribe();
/// assert_eq!(hub.receiver_count(), 1);
/// # drop(rx);
/// ```
#[derive(Debug)]
pub struct BroadcastHub {
    trades_tx: broadcast::Sender<TradeEnvelope>,
}

impl BroadcastHub {
    /// Create a new hub.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            trades_tx: broadcast::channel(config.capacity.max(1)).0,
        }
    }

    /// Create a hub with the default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Send an envelope to all receivers.
    ///
    /// Returns the number of receivers, or `None` if there are none.
    #[must_use]
    pub fn send(&self, envelope: TradeEnvelope) -> Option<usize> {
        self.trades_tx.send(envelope).ok()
    }

    /// Get a new receiver. Only envelopes sent after this call are seen.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TradeEnvelope> {
        self.trades_tx.subscribe()
    }

    /// Number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.trades_tx.receiver_count()
    }

    /// Snapshot of hub statistics.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            receivers: self.receiver_count(),
            queued: self.trades_tx.len(),
        }
    }
}

#[async_trait]
impl TradeSink for BroadcastHub {
    async fn publish(&self, envelope: TradeEnvelope) -> Result<(), SinkError> {
        if self.send(envelope).is_none() {
            tracing::trace!("No receivers for relayed trade");
            metrics::record_trade_undelivered();
        }
        Ok(())
    }

    fn mode(&self) -> OutputMode {
        OutputMode::Broadcast
    }
}

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Statistics about the re-publish channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Number of receivers.
    pub receivers: usize,
    /// Envelopes not yet seen by every receiver.
    pub queued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::queue::tests::make_trade;

    #[test]
    fn receiver_count_tracks_subscriptions() {
        let hub = BroadcastHub::with_defaults();
        assert_eq!(hub.receiver_count(), 0);

        let rx1 = hub.subscribe();
        let _rx2 = hub.subscribe();
        assert_eq!(hub.receiver_count(), 2);

        drop(rx1);
        assert_eq!(hub.stats().receivers, 1);
    }

    #[tokio::test]
    async fn every_receiver_gets_the_envelope() {
        let hub = BroadcastHub::with_defaults();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        hub.publish(TradeEnvelope::for_trade(make_trade("BNBBTC", 3)))
            .await
            .unwrap();

        assert_eq!(rx1.recv().await.unwrap().stream, "BNBBTC@trade");
        assert_eq!(rx2.recv().await.unwrap().data.trade_id, 3);
    }

    #[tokio::test]
    async fn publishing_without_receivers_is_not_an_error() {
        let hub = BroadcastHub::with_defaults();
        assert!(
            hub.publish(TradeEnvelope::for_trade(make_trade("BNBBTC", 1)))
                .await
                .is_ok()
        );
        assert!(hub.send(TradeEnvelope::for_trade(make_trade("BNBBTC", 2))).is_none());
    }

    #[test]
    fn reports_broadcast_mode() {
        assert_eq!(BroadcastHub::with_defaults().mode(), OutputMode::Broadcast);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let hub = BroadcastHub::new(BroadcastConfig { capacity: 0 });
        assert_eq!(hub.stats(), BroadcastStats::default());
    }
}
