//! Relay Configuration Settings
//!
//! Configuration types for the trade relay, loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::application::ports::{OutputMode, ProducerKind};
use crate::application::queue::DEFAULT_QUEUE_CAPACITY;
use crate::application::services::{DEFAULT_SHUTDOWN_GRACE, RelaySettings};
use crate::domain::symbols::{AllowedSymbolSet, SymbolSetError, parse_symbol_list};
use crate::infrastructure::binance::{DEFAULT_STREAM_HOST, DEFAULT_SYNTHETIC_INTERVAL, StreamEndpoint};
use crate::infrastructure::broadcast::{BroadcastConfig, DEFAULT_BROADCAST_CAPACITY};

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Normalized allow-list, sorted.
    pub symbols: Vec<String>,
    /// Combined-stream host (`host:port`).
    pub stream_host: String,
    /// Which producer fills the queue.
    pub producer: ProducerKind,
    /// Where accepted trades go.
    pub output: OutputMode,
    /// Trade queue capacity.
    pub queue_capacity: usize,
    /// Re-publish channel capacity.
    pub broadcast_capacity: usize,
    /// Close handshake grace period.
    pub shutdown_grace: Duration,
    /// Synthetic producer tick.
    pub synthetic_interval: Duration,
    /// Server port settings.
    pub server: ServerSettings,
    /// Symbols to watch once the relay is running.
    pub watch: Vec<String>,
    /// Symbols to unwatch once the relay is running.
    pub unwatch: Vec<String>,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol list is missing or invalid, or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::parse(&lookup).inspect_err(|e| tracing::error!(error = %e, "Invalid configuration"))
    }

    fn parse<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_symbols = lookup("SYMBOLS")
            .or_else(|| lookup("symbols"))
            .ok_or_else(|| ConfigError::MissingEnvVar("SYMBOLS".to_string()))?;

        let mut symbols: Vec<String> = parse_symbol_list(&raw_symbols)?.into_iter().collect();
        symbols.sort();

        let stream_host = lookup("BINANCE_STREAM_HOST")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STREAM_HOST.to_string());

        let producer = lookup("RELAY_PRODUCER")
            .map(|s| ProducerKind::from_str_case_insensitive(&s))
            .unwrap_or(ProducerKind::Live);

        let output = lookup("RELAY_OUTPUT")
            .map(|s| OutputMode::from_str_case_insensitive(&s))
            .unwrap_or(OutputMode::Broadcast);

        let server = ServerSettings {
            health_port: parse_var(lookup, "RELAY_HEALTH_PORT", ServerSettings::default().health_port)?,
        };

        Ok(Self {
            symbols,
            stream_host,
            producer,
            output,
            queue_capacity: parse_var(lookup, "TRADE_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            broadcast_capacity: parse_var(lookup, "BROADCAST_CAPACITY", DEFAULT_BROADCAST_CAPACITY)?,
            shutdown_grace: parse_millis(lookup, "SHUTDOWN_GRACE_MS", DEFAULT_SHUTDOWN_GRACE)?,
            synthetic_interval: parse_millis(
                lookup,
                "SYNTHETIC_INTERVAL_MS",
                DEFAULT_SYNTHETIC_INTERVAL,
            )?,
            server,
            watch: parse_list(lookup("RELAY_WATCH").as_deref()),
            unwatch: parse_list(lookup("RELAY_UNWATCH").as_deref()),
        })
    }

    /// Combined-stream endpoint for the allow-list.
    #[must_use]
    pub fn endpoint(&self) -> StreamEndpoint {
        StreamEndpoint::new(self.stream_host.clone(), &self.symbols)
    }

    /// Combined-stream websocket URL.
    #[must_use]
    pub fn stream_url(&self) -> String {
        self.endpoint().url()
    }

    /// Whether the exchange connection must be dialed.
    ///
    /// The live producer reads from it and bridge mode writes to it.
    #[must_use]
    pub fn needs_connection(&self) -> bool {
        self.producer == ProducerKind::Live || self.output == OutputMode::Bridge
    }

    /// Build the shared allow-list.
    ///
    /// # Errors
    ///
    /// Only fails if the stored list was modified into an invalid state.
    pub fn symbol_set(&self) -> Result<AllowedSymbolSet, SymbolSetError> {
        AllowedSymbolSet::from_symbols(&self.symbols)
    }

    /// Relay tuning derived from this configuration.
    #[must_use]
    pub const fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            queue_capacity: self.queue_capacity,
            shutdown_grace: self.shutdown_grace,
        }
    }

    /// Re-publish channel configuration.
    #[must_use]
    pub const fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            capacity: self.broadcast_capacity,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// The symbol list is unusable.
    #[error(transparent)]
    Symbols(#[from] SymbolSetError),

    /// A variable is present but does not parse.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_var(lookup, key, default_ms).map(Duration::from_millis)
}

fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    })
    .unwrap_or_default()
}
