//! Binance Trade Relay Binary
//!
//! Starts the trade relay.
//!
//! # Usage
//!
//! ```bash
//! SYMBOLS=bnbbtc,ethbtc cargo run --bin binance-trade-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `SYMBOLS` (or `symbols`): comma-separated allow-list, at most 1024
//!
//! ## Optional
//! - `BINANCE_STREAM_HOST`: combined-stream host (default: stream.binance.com:9443)
//! - `RELAY_PRODUCER`: live | synthetic (default: live)
//! - `RELAY_OUTPUT`: broadcast | bridge (default: broadcast)
//! - `TRADE_QUEUE_CAPACITY`: trade queue size (default: 1024)
//! - `BROADCAST_CAPACITY`: re-publish channel size (default: 4096)
//! - `SHUTDOWN_GRACE_MS`: close handshake wait (default: 1000)
//! - `SYNTHETIC_INTERVAL_MS`: synthetic producer tick (default: 1000)
//! - `RELAY_HEALTH_PORT`: health check HTTP port, 0 disables (default: 8083)
//! - `RELAY_WATCH` / `RELAY_UNWATCH`: symbols to add/remove after startup
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: binance_trade_relay=info)

use std::sync::Arc;

use anyhow::Context;
use binance_trade_relay::application::ports::{
    CloseHandshake, OutputMode, ProducerKind, TradeProducer, TradeSink,
};
use binance_trade_relay::application::services::{RelayHandle, TradeRelay};
use binance_trade_relay::domain::trade::TradeEnvelope;
use binance_trade_relay::infrastructure::binance::{
    ConnectionManager, JsonCodec, LiveProducer, SyntheticProducer,
};
use binance_trade_relay::infrastructure::broadcast::{BroadcastHub, ConnectionSink};
use binance_trade_relay::infrastructure::health::{HealthServer, HealthServerState};
use binance_trade_relay::infrastructure::telemetry;
use binance_trade_relay::{RelayConfig, init_metrics};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let telemetry_guard = telemetry::init();

    tracing::info!(
        span_export = telemetry_guard.is_exporting(),
        "Starting Binance Trade Relay"
    );

    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let symbols = Arc::new(
        config
            .symbol_set()
            .inspect_err(|e| tracing::error!(error = %e, "Invalid symbol list"))?,
    );

    let connection = if config.needs_connection() {
        let url = config.stream_url();
        tracing::info!("Connecting to {url} websocket");
        let manager = ConnectionManager::dial(&url)
            .await
            .context("failed to connect to exchange")?;
        Some(Arc::new(manager))
    } else {
        None
    };

    let producer: Box<dyn TradeProducer> = match config.producer {
        ProducerKind::Live => {
            let reader = connection
                .as_ref()
                .and_then(|c| c.take_reader())
                .context("exchange connection has no reader")?;
            Box::new(LiveProducer::new(Box::new(reader)))
        }
        ProducerKind::Synthetic => Box::new(SyntheticProducer::new(config.synthetic_interval)),
    };

    let broadcast_hub = Arc::new(BroadcastHub::new(config.broadcast_config()));
    let sink: Arc<dyn TradeSink> = match config.output {
        OutputMode::Broadcast => Arc::clone(&broadcast_hub) as Arc<dyn TradeSink>,
        OutputMode::Bridge => {
            let connection = connection
                .clone()
                .context("bridge output requires an exchange connection")?;
            Arc::new(ConnectionSink::new(connection))
        }
    };

    let close_side = connection
        .clone()
        .map(|c| c as Arc<dyn CloseHandshake>);

    let relay = TradeRelay::new(
        config.relay_settings(),
        symbols,
        producer,
        sink,
        close_side,
    );
    let handle = relay.handle();

    let shutdown_token = CancellationToken::new();

    if config.server.health_port != 0 {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            handle.clone(),
            (config.output == OutputMode::Broadcast).then(|| Arc::clone(&broadcast_hub)),
            config.producer,
            config.output,
        ));
        let health_server =
            HealthServer::new(config.server.health_port, health_state, shutdown_token.clone());

        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let consumer = (config.output == OutputMode::Broadcast)
        .then(|| tokio::spawn(log_received(broadcast_hub.subscribe())));

    let relay_task = tokio::spawn(relay.run(await_interrupt()));
    tracing::info!("Started receiving trades");

    apply_symbol_changes(&handle, &config);

    match relay_task.await.context("relay task failed")? {
        Ok(report) => tracing::info!(
            reason = report.reason.as_str(),
            producer = report.producer.as_str(),
            close = ?report.close,
            forwarded = report.forwarded,
            filtered = report.filtered,
            "Relay finished"
        ),
        Err(e) => tracing::error!(error = %e, "Relay finished with error"),
    }

    shutdown_token.cancel();

    if let Err(e) = handle.close().await {
        tracing::warn!(error = %e, "Failed to release exchange connection");
    }

    if let Some(consumer) = consumer {
        consumer.abort();
    }

    tracing::info!("Trade relay stopped");
    Ok(())
}

/// Apply the post-startup watch/unwatch lists.
fn apply_symbol_changes(handle: &RelayHandle, config: &RelayConfig) {
    for symbol in &config.watch {
        match handle.watch_symbol(symbol) {
            Ok(added) => tracing::info!(symbol = %symbol, added, "Watch symbol"),
            Err(e) => tracing::warn!(symbol = %symbol, error = %e, "Watch symbol rejected"),
        }
    }

    for symbol in &config.unwatch {
        match handle.unwatch_symbol(symbol) {
            Ok(removed) => tracing::info!(symbol = %symbol, removed, "Unwatch symbol"),
            Err(e) => tracing::warn!(symbol = %symbol, error = %e, "Unwatch symbol rejected"),
        }
    }

    tracing::info!(symbols = ?handle.allowed_symbols(), "Allow-list updated");
}

/// Log every re-published trade until the channel closes.
async fn log_received(mut rx: broadcast::Receiver<TradeEnvelope>) {
    let codec = JsonCodec::new();

    loop {
        match rx.recv().await {
            Ok(envelope) => {
                let payload = codec
                    .encode_pretty(&envelope.data)
                    .unwrap_or_else(|e| format!("<unencodable: {e}>"));
                tracing::info!("received message from {} to process\n{payload}", envelope.stream);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Trade consumer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        symbols = config.symbols.len(),
        producer = config.producer.as_str(),
        output = config.output.as_str(),
        queue_capacity = config.queue_capacity,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        stream_url = %config.stream_url(),
        shutdown_grace_ms = u64::try_from(config.shutdown_grace.as_millis()).unwrap_or(u64::MAX),
        "Exchange endpoint"
    );
}

/// Resolve on SIGINT or SIGTERM.
#[allow(clippy::expect_used)]
async fn await_interrupt() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
