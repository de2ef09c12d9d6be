//! Termination Signal and Shutdown Phases
//!
//! [`TerminationSignal`] is the single cooperative cancellation object shared
//! by every loop in the relay. It fires at most once; later calls to
//! [`TerminationSignal::fire`] are no-ops that report `false`. The first
//! caller's [`ShutdownReason`] is kept.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Shutdown Reason
// =============================================================================

/// Why the termination signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// External interrupt (Ctrl+C / SIGTERM) observed by the dispatcher.
    Interrupted,
    /// Producer detected a transport read failure.
    TransportFailure,
    /// Producer finished on its own (queue closed).
    ProducerFinished,
    /// Output sink rejected a write.
    SinkFailure,
}

impl ShutdownReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interrupted => "interrupted",
            Self::TransportFailure => "transport_failure",
            Self::ProducerFinished => "producer_finished",
            Self::SinkFailure => "sink_failure",
        }
    }
}

// =============================================================================
// Termination Signal
// =============================================================================

/// Broadcast-once termination signal.
///
/// Cloning yields another handle to the same signal.
#[derive(Debug, Clone, Default)]
pub struct TerminationSignal {
    token: CancellationToken,
    reason: Arc<RwLock<Option<ShutdownReason>>>,
}

impl TerminationSignal {
    /// Create an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal.
    ///
    /// Returns `true` for the call that actually fired it.
    pub fn fire(&self, reason: ShutdownReason) -> bool {
        {
            let mut slot = self.reason.write();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }

        self.token.cancel();
        true
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason recorded by the first [`fire`](Self::fire) call.
    #[must_use]
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.reason.read()
    }

    /// Resolve once the signal has fired.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}

// =============================================================================
// Shutdown Phase
// =============================================================================

/// Shutdown state machine.
///
/// `Running → ClosingLocal → Closed` on interrupt,
/// `Running → ClosingRemote → Closed` on transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPhase {
    /// Pipeline is processing trades.
    #[default]
    Running,
    /// Close handshake initiated by us.
    ClosingLocal,
    /// Peer or transport ended the stream.
    ClosingRemote,
    /// Pipeline stopped.
    Closed,
}

impl ShutdownPhase {
    /// Phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::ClosingLocal => "closing_local",
            Self::ClosingRemote => "closing_remote",
            Self::Closed => "closed",
        }
    }
}
