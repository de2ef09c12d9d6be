//! Shutdown Coordinator
//!
//! Owns the termination protocol.
//!
//! - **Interrupt**: send a close frame, then wait for the termination signal
//!   (the producer fires it when the peer closes) or the grace period,
//!   whichever comes first. Running out the grace period is not an error.
//! - **Remote failure**: the producer already fired the signal; nothing is
//!   sent because the transport is unusable.
//!
//! Without a connection (synthetic producer, broadcast output) the interrupt
//! path skips the handshake entirely.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::application::ports::{CloseHandshake, TransportError};
use crate::domain::shutdown::{ShutdownPhase, TerminationSignal};

/// Default wait for the peer to acknowledge a close frame.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// How a local close handshake ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Termination signal fired within the grace period.
    Acknowledged,
    /// Grace period elapsed first.
    TimedOut,
    /// No connection to close.
    NoConnection,
}

/// Drives the close handshake and tracks the shutdown phase.
pub struct ShutdownCoordinator {
    connection: Option<Arc<dyn CloseHandshake>>,
    signal: TerminationSignal,
    grace: Duration,
    phase: RwLock<ShutdownPhase>,
}

impl ShutdownCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        connection: Option<Arc<dyn CloseHandshake>>,
        signal: TerminationSignal,
        grace: Duration,
    ) -> Self {
        Self {
            connection,
            signal,
            grace,
            phase: RwLock::new(ShutdownPhase::Running),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.read()
    }

    /// Grace period for the close handshake.
    #[must_use]
    pub const fn grace(&self) -> Duration {
        self.grace
    }

    fn transition(&self, next: ShutdownPhase) {
        let mut phase = self.phase.write();
        if *phase == ShutdownPhase::Closed {
            return;
        }
        tracing::debug!(from = phase.as_str(), to = next.as_str(), "Shutdown phase");
        *phase = next;
    }

    /// Interrupt path: close frame, then bounded wait.
    ///
    /// Sending the frame and waiting for the acknowledgement share one
    /// deadline, so a peer that stops reading cannot hold this past the grace
    /// period.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Write`] if the close frame cannot be sent.
    pub async fn close_locally(&self) -> Result<CloseOutcome, TransportError> {
        self.transition(ShutdownPhase::ClosingLocal);

        let Some(connection) = &self.connection else {
            return Ok(CloseOutcome::NoConnection);
        };

        let grace_ms = u64::try_from(self.grace.as_millis()).unwrap_or(u64::MAX);
        let deadline = Instant::now() + self.grace;

        if let Ok(sent) = tokio::time::timeout_at(deadline, connection.send_close()).await {
            sent?;
        } else {
            tracing::warn!(grace_ms, "Close frame not sent within grace period");
            return Ok(CloseOutcome::TimedOut);
        }
        tracing::debug!("Close frame sent");

        if tokio::time::timeout_at(deadline, self.signal.fired())
            .await
            .is_ok()
        {
            tracing::info!("Peer acknowledged close");
            Ok(CloseOutcome::Acknowledged)
        } else {
            tracing::info!(grace_ms, "Close acknowledgement timed out");
            Ok(CloseOutcome::TimedOut)
        }
    }

    /// Remote path: the signal fired without a local interrupt.
    pub fn observe_remote(&self) {
        if self.phase() == ShutdownPhase::Running {
            self.transition(ShutdownPhase::ClosingRemote);
        }
    }

    /// Mark the pipeline stopped.
    pub fn finish(&self) {
        self.transition(ShutdownPhase::Closed);
    }

    /// Release the connection. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// Propagates the connection's close error on the first call.
    pub async fn close(&self) -> Result<(), TransportError> {
        match &self.connection {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }
}
