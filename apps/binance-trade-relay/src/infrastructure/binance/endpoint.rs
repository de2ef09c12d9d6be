//! Combined Stream Endpoint
//!
//! Builds the websocket URL that subscribes to one `<symbol>@trade` stream
//! per allowed symbol:
//!
//! `wss://stream.binance.com:9443/stream?streams=bnbbtc@trade/neobtc@trade`

use crate::domain::trade::{TRADE_EVENT_TYPE, subscription_stream_id};

/// Production combined-stream host.
pub const DEFAULT_STREAM_HOST: &str = "stream.binance.com:9443";

/// Combined-stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    scheme: &'static str,
    host: String,
    streams: Vec<String>,
}

impl StreamEndpoint {
    /// Secure endpoint on `host` for the given symbols.
    ///
    /// Symbols are lowercased and sorted so the URL is deterministic.
    #[must_use]
    pub fn new<I, S>(host: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_scheme("wss", host, symbols)
    }

    /// Plain-text endpoint, for local test servers.
    #[must_use]
    pub fn insecure<I, S>(host: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_scheme("ws", host, symbols)
    }

    fn with_scheme<I, S>(scheme: &'static str, host: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut streams: Vec<String> = symbols
            .into_iter()
            .map(|s| subscription_stream_id(s.as_ref().trim(), TRADE_EVENT_TYPE))
            .collect();
        streams.sort();
        streams.dedup();

        Self {
            scheme,
            host: host.into(),
            streams,
        }
    }

    /// Subscribed stream identifiers.
    #[must_use]
    pub fn streams(&self) -> &[String] {
        &self.streams
    }

    /// Full websocket URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}://{}/stream?streams={}",
            self.scheme,
            self.host,
            self.streams.join("/")
        )
    }
}

impl std::fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_combined_stream_url() {
        let endpoint = StreamEndpoint::new(DEFAULT_STREAM_HOST, ["neobtc", "BNBBTC"]);
        assert_eq!(
            endpoint.url(),
            "wss://stream.binance.com:9443/stream?streams=bnbbtc@trade/neobtc@trade"
        );
    }

    #[test]
    fn single_symbol() {
        let endpoint = StreamEndpoint::new(DEFAULT_STREAM_HOST, ["bnbbtc"]);
        assert_eq!(
            endpoint.to_string(),
            "wss://stream.binance.com:9443/stream?streams=bnbbtc@trade"
        );
        assert_eq!(endpoint.streams(), ["bnbbtc@trade".to_string()]);
    }

    #[test]
    fn insecure_scheme_for_local_servers() {
        let endpoint = StreamEndpoint::insecure("127.0.0.1:9000", [" ethbtc ", "ETHBTC"]);
        assert_eq!(
            endpoint.url(),
            "ws://127.0.0.1:9000/stream?streams=ethbtc@trade"
        );
    }
}
