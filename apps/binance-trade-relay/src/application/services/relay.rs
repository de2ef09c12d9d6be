//! Trade Relay
//!
//! The unified run loop. One task runs the producer; the calling task runs
//! the dispatcher select loop, which waits on (in priority order) the
//! termination signal, the external interrupt and the next queued trade.
//!
//! ```text
//! Producer ──► TradeQueue ──► Dispatcher ──► TradeSink
//!     │                           ▲
//!     └──── TerminationSignal ────┘◄── ShutdownCoordinator ◄── interrupt
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{
    CloseHandshake, ProducerKind, TradeProducer, TradeSink, TransportError,
};
use crate::application::queue::{DEFAULT_QUEUE_CAPACITY, TradeQueue};
use crate::application::services::dispatcher::{DispatchError, DispatchStats, Dispatcher};
use crate::application::services::shutdown::{
    CloseOutcome, DEFAULT_SHUTDOWN_GRACE, ShutdownCoordinator,
};
use crate::domain::shutdown::{ShutdownPhase, ShutdownReason, TerminationSignal};
use crate::domain::symbols::{AllowedSymbolSet, SymbolSetError};
use crate::infrastructure::metrics;

// =============================================================================
// Errors and Reports
// =============================================================================

/// Pipeline-phase errors. None of these abort the process.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Sending the close frame failed.
    #[error("error while closing: {0}")]
    CloseHandshake(#[source] TransportError),

    /// The dispatcher could not write an accepted trade.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    /// Why the run ended.
    pub reason: ShutdownReason,
    /// Producer variant that was running.
    pub producer: ProducerKind,
    /// Close handshake result, for the interrupt path.
    pub close: Option<CloseOutcome>,
    /// Trades handed to the sink.
    pub forwarded: u64,
    /// Trades dropped by the filter.
    pub filtered: u64,
}

/// Relay tuning.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Trade queue capacity.
    pub queue_capacity: usize,
    /// Close handshake grace period.
    pub shutdown_grace: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

// =============================================================================
// Relay Handle
// =============================================================================

/// Cloneable control surface, usable while the relay runs.
#[derive(Clone)]
pub struct RelayHandle {
    symbols: Arc<AllowedSymbolSet>,
    signal: TerminationSignal,
    coordinator: Arc<ShutdownCoordinator>,
    stats: Arc<DispatchStats>,
}

impl RelayHandle {
    /// Start relaying a symbol. Takes effect for every trade dequeued after
    /// this returns.
    ///
    /// # Errors
    ///
    /// See [`AllowedSymbolSet::watch`].
    pub fn watch_symbol(&self, symbol: &str) -> Result<bool, SymbolSetError> {
        let added = self.symbols.watch(symbol)?;
        metrics::set_allowed_symbols(self.symbols.len());
        Ok(added)
    }

    /// Stop relaying a symbol.
    ///
    /// # Errors
    ///
    /// See [`AllowedSymbolSet::unwatch`].
    pub fn unwatch_symbol(&self, symbol: &str) -> Result<bool, SymbolSetError> {
        let removed = self.symbols.unwatch(symbol)?;
        metrics::set_allowed_symbols(self.symbols.len());
        Ok(removed)
    }

    /// Sorted allow-list.
    #[must_use]
    pub fn allowed_symbols(&self) -> Vec<String> {
        self.symbols.snapshot()
    }

    /// Current shutdown phase.
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        self.coordinator.phase()
    }

    /// Whether the termination signal has fired.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.signal.is_fired()
    }

    /// Dispatch counters.
    #[must_use]
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Release the exchange connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates a close failure from the first call only.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.coordinator.close().await
    }
}

// =============================================================================
// Trade Relay
// =============================================================================

/// Producer → queue → dispatcher pipeline with coordinated shutdown.
pub struct TradeRelay {
    handle: RelayHandle,
    producer: Box<dyn TradeProducer>,
    dispatcher: Dispatcher,
    settings: RelaySettings,
}

impl TradeRelay {
    /// Assemble a relay.
    ///
    /// `connection` is the close side of the exchange connection, if one was
    /// dialed.
    #[must_use]
    pub fn new(
        settings: RelaySettings,
        symbols: Arc<AllowedSymbolSet>,
        producer: Box<dyn TradeProducer>,
        sink: Arc<dyn TradeSink>,
        connection: Option<Arc<dyn CloseHandshake>>,
    ) -> Self {
        let signal = TerminationSignal::new();
        let coordinator = Arc::new(ShutdownCoordinator::new(
            connection,
            signal.clone(),
            settings.shutdown_grace,
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&symbols), sink);
        metrics::set_allowed_symbols(symbols.len());

        Self {
            handle: RelayHandle {
                symbols,
                signal,
                coordinator,
                stats: dispatcher.stats(),
            },
            producer,
            dispatcher,
            settings,
        }
    }

    /// Control handle for use while [`run`](Self::run) is in progress.
    #[must_use]
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Run until the signal fires, `interrupt` resolves or the sink fails.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CloseHandshake`] if the close frame cannot be
    /// sent and [`RelayError::Dispatch`] if the sink rejects a trade. The
    /// termination signal is fired on every exit path.
    pub async fn run<F>(self, interrupt: F) -> Result<RelayReport, RelayError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            handle,
            producer,
            dispatcher,
            settings,
        } = self;
        let signal = handle.signal.clone();
        let coordinator = Arc::clone(&handle.coordinator);
        let producer_kind = producer.kind();

        let (queue_tx, mut queue_rx) = TradeQueue::bounded(settings.queue_capacity);
        let mut producer_task = tokio::spawn(producer.run(queue_tx, signal.clone()));

        tracing::info!(
            producer = producer_kind.as_str(),
            queue_capacity = queue_rx.capacity(),
            symbols = handle.symbols.len(),
            "Relay started"
        );

        tokio::pin!(interrupt);
        let mut close = None;

        let result: Result<ShutdownReason, RelayError> = loop {
            tokio::select! {
                biased;

                () = signal.fired() => {
                    coordinator.observe_remote();
                    break Ok(signal.reason().unwrap_or(ShutdownReason::TransportFailure));
                }
                () = &mut interrupt => {
                    break close_on_interrupt(&coordinator, &mut close).await;
                }
                trade = queue_rx.recv() => {
                    let Some(trade) = trade else {
                        tracing::info!("Trade queue closed by producer");
                        break Ok(ShutdownReason::ProducerFinished);
                    };
                    metrics::set_queue_depth(queue_rx.len());

                    // A stalled sink must not outlive the signal or the interrupt.
                    tokio::select! {
                        biased;

                        () = signal.fired() => {
                            tracing::warn!("Termination signal fired while publishing a trade");
                            coordinator.observe_remote();
                            break Ok(signal.reason().unwrap_or(ShutdownReason::TransportFailure));
                        }
                        () = &mut interrupt => {
                            tracing::warn!("Interrupted while publishing a trade");
                            break close_on_interrupt(&coordinator, &mut close).await;
                        }
                        dispatched = dispatcher.dispatch(trade) => {
                            if let Err(e) = dispatched {
                                break Err(e.into());
                            }
                        }
                    }
                }
            }
        };

        let reason = match &result {
            Ok(reason) => *reason,
            Err(RelayError::CloseHandshake(_)) => ShutdownReason::Interrupted,
            Err(RelayError::Dispatch(_)) => ShutdownReason::SinkFailure,
        };
        signal.fire(reason);
        coordinator.finish();
        metrics::record_shutdown(reason);

        if tokio::time::timeout(settings.shutdown_grace, &mut producer_task)
            .await
            .is_err()
        {
            tracing::warn!("Producer did not stop within grace period, aborting");
            producer_task.abort();
        }

        let stats = handle.stats();
        tracing::info!(
            reason = reason.as_str(),
            forwarded = stats.forwarded(),
            filtered = stats.filtered(),
            "Relay stopped"
        );

        result.map(|reason| RelayReport {
            reason,
            producer: producer_kind,
            close,
            forwarded: stats.forwarded(),
            filtered: stats.filtered(),
        })
    }
}

async fn close_on_interrupt(
    coordinator: &ShutdownCoordinator,
    close: &mut Option<CloseOutcome>,
) -> Result<ShutdownReason, RelayError> {
    tracing::info!("interrupt");
    let outcome = coordinator
        .close_locally()
        .await
        .map_err(RelayError::CloseHandshake)?;
    *close = Some(outcome);
    Ok(ShutdownReason::Interrupted)
}
