//! Application Services
//!
//! The relay pipeline: dispatcher, shutdown coordination and the unified
//! run loop that ties them to a producer.

pub mod dispatcher;
pub mod relay;
pub mod shutdown;

pub use dispatcher::{DispatchError, DispatchOutcome, DispatchStats, Dispatcher};
pub use relay::{RelayError, RelayHandle, RelayReport, RelaySettings, TradeRelay};
pub use shutdown::{CloseOutcome, DEFAULT_SHUTDOWN_GRACE, ShutdownCoordinator};
