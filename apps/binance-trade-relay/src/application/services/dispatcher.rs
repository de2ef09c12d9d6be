//! Trade Dispatcher
//!
//! Applies the symbol/event-type filter to dequeued trades and hands the
//! survivors to the output sink. The allow-list is read at dequeue time, so a
//! watch/unwatch call affects trades already waiting in the queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::application::ports::{SinkError, TradeSink};
use crate::domain::symbols::AllowedSymbolSet;
use crate::domain::trade::{StreamEnvelope, TradeEvent};
use crate::infrastructure::metrics;

/// Dispatcher errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The output sink rejected an accepted trade.
    #[error("error while relaying {stream}: {source}")]
    Write {
        /// Stream identifier of the trade being relayed.
        stream: String,
        /// Sink failure.
        source: SinkError,
    },
}

/// Result of dispatching one trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Trade passed the filter and reached the sink.
    Forwarded,
    /// Trade was dropped by the filter.
    Filtered,
}

/// Running dispatch counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    forwarded: AtomicU64,
    filtered: AtomicU64,
}

impl DispatchStats {
    /// Trades handed to the sink.
    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Trades dropped by the filter.
    #[must_use]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }
}

/// Filters trades and forwards accepted ones to a sink.
pub struct Dispatcher {
    symbols: Arc<AllowedSymbolSet>,
    sink: Arc<dyn TradeSink>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// Create a dispatcher over a shared allow-list.
    #[must_use]
    pub fn new(symbols: Arc<AllowedSymbolSet>, sink: Arc<dyn TradeSink>) -> Self {
        Self {
            symbols,
            sink,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Filter predicate: allowed symbol and `trade` event type.
    #[must_use]
    pub fn accepts(&self, trade: &TradeEvent) -> bool {
        trade.is_trade() && self.symbols.contains(&trade.symbol.to_lowercase())
    }

    /// Dispatch one trade.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Write`] if the sink fails. The caller must
    /// stop dispatching.
    pub async fn dispatch(&self, trade: TradeEvent) -> Result<DispatchOutcome, DispatchError> {
        let started = Instant::now();

        if !self.accepts(&trade) {
            tracing::trace!(
                symbol = %trade.symbol,
                event_type = %trade.event_type,
                "Trade filtered"
            );
            self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            metrics::record_trade_filtered();
            return Ok(DispatchOutcome::Filtered);
        }

        let envelope = StreamEnvelope::for_trade(trade);
        let stream = envelope.stream.clone();

        self.sink
            .publish(envelope)
            .await
            .map_err(|source| DispatchError::Write { stream, source })?;

        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
        metrics::record_trade_forwarded(self.sink.mode());
        metrics::record_dispatch_duration(started.elapsed());
        Ok(DispatchOutcome::Forwarded)
    }
}
