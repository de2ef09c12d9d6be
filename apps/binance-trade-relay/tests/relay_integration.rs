//! End-to-end relay tests against a local websocket server.
//!
//! Each test starts a `tokio-tungstenite` server on `127.0.0.1:0`, dials it
//! with the real connection manager and drives the relay through one of its
//! shutdown paths.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use binance_trade_relay::application::ports::CloseHandshake;
use binance_trade_relay::{
    AllowedSymbolSet, BroadcastHub, CloseOutcome, ConnectionManager, ConnectionSink, LiveProducer,
    RelaySettings, ShutdownPhase, ShutdownReason, StreamEndpoint, SyntheticProducer, TradeRelay,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_test::assert_ok;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

type ServerSocket = WebSocketStream<TcpStream>;

// =============================================================================
// Helpers
// =============================================================================

async fn serve_once<F, Fut>(handler: F) -> SocketAddr
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });

    addr
}

async fn dial(addr: SocketAddr, symbols: &[&str]) -> Arc<ConnectionManager> {
    let url = StreamEndpoint::insecure(addr.to_string(), symbols).url();
    Arc::new(ConnectionManager::dial(&url).await.unwrap())
}

fn trade_frame(symbol: &str, trade_id: i64) -> String {
    serde_json::json!({
        "stream": format!("{}@trade", symbol.to_lowercase()),
        "data": {
            "e": "trade", "E": 1_700_000_000_000_i64, "s": symbol, "t": trade_id,
            "p": "0.00100000", "q": "100", "b": 88, "a": 50,
            "T": 1_700_000_000_000_i64, "m": true, "M": true
        }
    })
    .to_string()
}

/// Drain the socket until the peer closes; tungstenite answers the close
/// frame while reading. Returns the close frame the client sent, if any.
async fn read_until_close(ws: &mut ServerSocket) -> Option<(CloseCode, String)> {
    let mut close = None;
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Close(Some(frame)) = message {
            close = Some((frame.code, frame.reason.as_str().to_string()));
        }
    }
    close
}

fn live_relay(
    connection: &Arc<ConnectionManager>,
    symbols: &str,
    grace: Duration,
) -> (TradeRelay, Arc<BroadcastHub>) {
    let hub = Arc::new(BroadcastHub::with_defaults());
    let reader = connection.take_reader().unwrap();
    let relay = TradeRelay::new(
        RelaySettings {
            shutdown_grace: grace,
            ..RelaySettings::default()
        },
        Arc::new(AllowedSymbolSet::parse(symbols).unwrap()),
        Box::new(LiveProducer::new(Box::new(reader))),
        hub.clone(),
        Some(connection.clone() as Arc<dyn CloseHandshake>),
    );
    (relay, hub)
}

// =============================================================================
// Remote Failure Path
// =============================================================================

#[tokio::test]
async fn forwards_allowed_trades_and_survives_malformed_frames() {
    let (close_tx, close_rx) = oneshot::channel::<()>();

    let addr = serve_once(move |mut ws| async move {
        ws.send(Message::Text(trade_frame("ETHBTC", 1).into())).await.unwrap();
        ws.send(Message::Text("{not json".into())).await.unwrap();
        ws.send(Message::Text(trade_frame("BNBBTC", 2).into())).await.unwrap();
        let _ = close_rx.await;
        let _ = ws.close(None).await;
    })
    .await;

    let connection = dial(addr, &["bnbbtc"]).await;
    let (relay, hub) = live_relay(&connection, "bnbbtc", Duration::from_secs(1));
    let handle = relay.handle();
    let mut received = hub.subscribe();

    let run = tokio::spawn(relay.run(std::future::pending()));

    let envelope = tokio::time::timeout(Duration::from_secs(5), received.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.stream, "BNBBTC@trade");
    assert_eq!(envelope.data.trade_id, 2);
    assert_eq!(envelope.data.price.to_string(), "0.00100000");

    close_tx.send(()).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(report.reason, ShutdownReason::TransportFailure);
    assert_eq!(report.close, None);
    assert_eq!(report.forwarded, 1);
    assert_eq!(report.filtered, 1);
    assert_eq!(handle.phase(), ShutdownPhase::Closed);

    assert_ok!(handle.close().await);
}

#[tokio::test]
async fn close_after_abrupt_disconnect_is_ok() {
    // Dropped without a close handshake, so the socket is reset under the client.
    let addr = serve_once(|ws| async move { drop(ws) }).await;

    let connection = dial(addr, &["bnbbtc"]).await;
    let (relay, _hub) = live_relay(&connection, "bnbbtc", Duration::from_secs(1));
    let handle = relay.handle();

    let report = tokio::time::timeout(Duration::from_secs(5), relay.run(std::future::pending()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.reason, ShutdownReason::TransportFailure);

    assert_ok!(handle.close().await);
    assert_ok!(handle.close().await);
    assert!(connection.is_closed());
}

// =============================================================================
// Interrupt Path
// =============================================================================

#[tokio::test]
async fn interrupt_sends_normal_close_and_peer_acknowledges() {
    let (frame_tx, frame_rx) = oneshot::channel();

    let addr = serve_once(move |mut ws| async move {
        let _ = frame_tx.send(read_until_close(&mut ws).await);
    })
    .await;

    let connection = dial(addr, &["bnbbtc"]).await;
    let (relay, _hub) = live_relay(&connection, "bnbbtc", Duration::from_secs(5));
    let handle = relay.handle();

    let started = Instant::now();
    let report = relay
        .run(tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();

    assert_eq!(report.reason, ShutdownReason::Interrupted);
    assert_eq!(report.close, Some(CloseOutcome::Acknowledged));
    assert!(started.elapsed() < Duration::from_secs(5));

    let (code, reason) = frame_rx.await.unwrap().unwrap();
    assert_eq!(code, CloseCode::Normal);
    assert!(reason.is_empty());

    // Idempotent.
    assert_ok!(handle.close().await);
    assert_ok!(handle.close().await);
    assert!(connection.is_closed());
}

#[tokio::test]
async fn interrupt_returns_within_grace_when_peer_is_silent() {
    let addr = serve_once(|ws| async move {
        // Never read, so the close frame is never answered.
        let _held = ws;
        tokio::time::sleep(Duration::from_secs(3)).await;
    })
    .await;

    let connection = dial(addr, &["bnbbtc"]).await;
    let (relay, _hub) = live_relay(&connection, "bnbbtc", Duration::from_millis(200));

    let started = Instant::now();
    let report = relay.run(std::future::ready(())).await.unwrap();

    assert_eq!(report.reason, ShutdownReason::Interrupted);
    assert_eq!(report.close, Some(CloseOutcome::TimedOut));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(2));
}

// =============================================================================
// Bridge Mode
// =============================================================================

#[tokio::test]
async fn bridge_mode_writes_envelope_back_to_connection() {
    let (echo_tx, echo_rx) = oneshot::channel::<String>();

    let addr = serve_once(move |mut ws| async move {
        ws.send(Message::Text(trade_frame("BNBBTC", 9).into())).await.unwrap();
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let _ = echo_tx.send(text.as_str().to_string());
        }
        read_until_close(&mut ws).await;
    })
    .await;

    let connection = dial(addr, &["bnbbtc"]).await;
    let reader = connection.take_reader().unwrap();
    let relay = TradeRelay::new(
        RelaySettings::default(),
        Arc::new(AllowedSymbolSet::parse("bnbbtc").unwrap()),
        Box::new(LiveProducer::new(Box::new(reader))),
        Arc::new(ConnectionSink::new(connection.clone())),
        Some(connection.clone() as Arc<dyn CloseHandshake>),
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let run = tokio::spawn(relay.run(async move {
        let _ = stop_rx.await;
    }));

    let echoed = tokio::time::timeout(Duration::from_secs(5), echo_rx)
        .await
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&echoed).unwrap();
    assert_eq!(value["stream"], "BNBBTC@trade");
    assert_eq!(value["data"]["t"], 9);
    assert_eq!(value["data"]["p"], "0.00100000");

    stop_tx.send(()).unwrap();
    let report = run.await.unwrap().unwrap();
    assert_eq!(report.reason, ShutdownReason::Interrupted);
    assert_eq!(report.forwarded, 1);
}

// =============================================================================
// Synthetic Producer
// =============================================================================

#[tokio::test]
async fn synthetic_producer_feeds_broadcast_without_network() {
    let hub = Arc::new(BroadcastHub::with_defaults());
    let relay = TradeRelay::new(
        RelaySettings::default(),
        Arc::new(AllowedSymbolSet::parse("bnbbtc").unwrap()),
        Box::new(SyntheticProducer::new(Duration::from_millis(10))),
        hub.clone(),
        None,
    );
    let mut received = hub.subscribe();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let run = tokio::spawn(relay.run(async move {
        let _ = stop_rx.await;
    }));

    for _ in 0..3 {
        let envelope = tokio::time::timeout(Duration::from_secs(2), received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.stream, "BNBBTC@trade");
        assert_eq!(envelope.data, SyntheticProducer::fixed_event());
    }

    stop_tx.send(()).unwrap();
    let report = run.await.unwrap().unwrap();
    assert_eq!(report.reason, ShutdownReason::Interrupted);
    assert_eq!(report.close, Some(CloseOutcome::NoConnection));
    assert!(report.forwarded >= 3);
}

#[tokio::test]
async fn unwatched_symbol_stops_flowing() {
    let hub = Arc::new(BroadcastHub::with_defaults());
    let relay = TradeRelay::new(
        RelaySettings::default(),
        Arc::new(AllowedSymbolSet::parse("bnbbtc").unwrap()),
        Box::new(SyntheticProducer::new(Duration::from_millis(10))),
        hub.clone(),
        None,
    );
    let handle = relay.handle();
    assert!(handle.unwatch_symbol("BNBBTC").unwrap());

    let report = relay
        .run(tokio::time::sleep(Duration::from_millis(100)))
        .await
        .unwrap();

    assert_eq!(report.forwarded, 0);
    assert!(report.filtered > 0);
}
