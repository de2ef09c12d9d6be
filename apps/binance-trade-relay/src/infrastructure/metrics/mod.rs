//! Prometheus Metrics Module
//!
//! Exposes relay metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Frames read from the exchange and decode failures
//! - **Trades**: Trades forwarded and filtered by the dispatcher
//! - **Queue**: Trade queue depth
//! - **Shutdown**: Shutdowns by reason
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::ports::OutputMode;
use crate::domain::shutdown::ShutdownReason;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "trade_relay_frames_received_total",
        "Total frames read from the exchange connection"
    );
    describe_counter!(
        "trade_relay_decode_errors_total",
        "Total frames that failed to decode"
    );
    describe_counter!(
        "trade_relay_trades_forwarded_total",
        "Total trades handed to the output sink"
    );
    describe_counter!(
        "trade_relay_trades_filtered_total",
        "Total trades dropped by the symbol/event filter"
    );
    describe_counter!(
        "trade_relay_trades_undelivered_total",
        "Total forwarded trades with no broadcast receiver"
    );
    describe_gauge!("trade_relay_queue_depth", "Trades waiting in the queue");
    describe_gauge!(
        "trade_relay_allowed_symbols",
        "Number of symbols in the allow-list"
    );
    describe_counter!("trade_relay_shutdowns_total", "Relay shutdowns by reason");
    describe_histogram!(
        "trade_relay_dispatch_seconds",
        "Time to filter and publish one trade"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a frame read from the exchange.
pub fn record_frame_received() {
    counter!("trade_relay_frames_received_total").increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error() {
    counter!("trade_relay_decode_errors_total").increment(1);
}

/// Record a trade handed to the sink.
pub fn record_trade_forwarded(mode: OutputMode) {
    counter!(
        "trade_relay_trades_forwarded_total",
        "mode" => mode.as_str()
    )
    .increment(1);
}

/// Record a trade dropped by the filter.
pub fn record_trade_filtered() {
    counter!("trade_relay_trades_filtered_total").increment(1);
}

/// Record a broadcast with no receivers.
pub fn record_trade_undelivered() {
    counter!("trade_relay_trades_undelivered_total").increment(1);
}

/// Update the queue depth gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(depth: usize) {
    gauge!("trade_relay_queue_depth").set(depth as f64);
}

/// Update the allow-list size gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_allowed_symbols(count: usize) {
    gauge!("trade_relay_allowed_symbols").set(count as f64);
}

/// Record a relay shutdown.
pub fn record_shutdown(reason: ShutdownReason) {
    counter!(
        "trade_relay_shutdowns_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record dispatch duration for one trade.
pub fn record_dispatch_duration(duration: Duration) {
    histogram!("trade_relay_dispatch_seconds").record(duration.as_secs_f64());
}
