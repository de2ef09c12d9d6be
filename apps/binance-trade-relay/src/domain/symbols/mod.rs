//! Allowed Symbol Set
//!
//! The allow-list of exchange tickers the relay forwards. Built once from a
//! comma-separated list and mutated afterwards only through
//! [`AllowedSymbolSet::watch`] and [`AllowedSymbolSet::unwatch`].
//!
//! # Design
//!
//! Symbols are stored lowercase. Membership is case-insensitive. All access
//! goes through an internal `RwLock`, so a watch/unwatch call is visible to
//! every dispatcher read that starts after it returns.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Maximum number of streams a single combined connection may carry.
pub const MAX_STREAMS: usize = 1024;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while building or mutating the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolSetError {
    /// No symbol survived trimming.
    #[error("no symbol is requested")]
    Empty,

    /// More distinct symbols than a combined stream accepts.
    #[error("no more than 1024 streams are allowed. you asked for {0}")]
    TooMany(usize),

    /// Symbol is empty after trimming.
    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),
}

// =============================================================================
// Parsing
// =============================================================================

/// Normalize a single symbol (trim + lowercase).
#[must_use]
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_lowercase()
}

/// Parse a comma-separated symbol list.
///
/// Entries are trimmed, lowercased and deduplicated; empty entries are
/// skipped.
///
/// # Errors
///
/// Returns [`SymbolSetError::Empty`] if nothing is left and
/// [`SymbolSetError::TooMany`] if more than [`MAX_STREAMS`] distinct symbols
/// were requested.
pub fn parse_symbol_list(raw: &str) -> Result<HashSet<String>, SymbolSetError> {
    let symbols: HashSet<String> = raw
        .split(',')
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .collect();

    if symbols.is_empty() {
        return Err(SymbolSetError::Empty);
    }

    if symbols.len() > MAX_STREAMS {
        return Err(SymbolSetError::TooMany(symbols.len()));
    }

    Ok(symbols)
}

// =============================================================================
// Allowed Symbol Set
// =============================================================================

/// Thread-safe, case-insensitive symbol allow-list.
#[derive(Debug, Default)]
pub struct AllowedSymbolSet {
    symbols: RwLock<HashSet<String>>,
}

impl AllowedSymbolSet {
    /// Build the set from a comma-separated list.
    ///
    /// # Errors
    ///
    /// See [`parse_symbol_list`].
    pub fn parse(raw: &str) -> Result<Self, SymbolSetError> {
        Ok(Self {
            symbols: RwLock::new(parse_symbol_list(raw)?),
        })
    }

    /// Build the set from individual symbols.
    ///
    /// # Errors
    ///
    /// Same invariants as [`parse_symbol_list`].
    pub fn from_symbols<I, S>(symbols: I) -> Result<Self, SymbolSetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = symbols
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&joined)
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        let symbols = self.symbols.read();
        if symbols.contains(symbol) {
            return true;
        }
        symbols.contains(&normalize_symbol(symbol))
    }

    /// Start allowing a symbol.
    ///
    /// Returns `true` if the symbol was not already allowed.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolSetError::InvalidSymbol`] for a blank symbol and
    /// [`SymbolSetError::TooMany`] if the set is already full.
    pub fn watch(&self, symbol: &str) -> Result<bool, SymbolSetError> {
        let normalized = normalize_symbol(symbol);
        if normalized.is_empty() {
            return Err(SymbolSetError::InvalidSymbol(symbol.to_string()));
        }

        let mut symbols = self.symbols.write();
        if symbols.contains(&normalized) {
            return Ok(false);
        }
        if symbols.len() >= MAX_STREAMS {
            return Err(SymbolSetError::TooMany(symbols.len() + 1));
        }

        symbols.insert(normalized);
        Ok(true)
    }

    /// Stop allowing a symbol.
    ///
    /// Returns `true` if the symbol was allowed before the call.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolSetError::InvalidSymbol`] for a blank symbol.
    pub fn unwatch(&self, symbol: &str) -> Result<bool, SymbolSetError> {
        let normalized = normalize_symbol(symbol);
        if normalized.is_empty() {
            return Err(SymbolSetError::InvalidSymbol(symbol.to_string()));
        }

        Ok(self.symbols.write().remove(&normalized))
    }

    /// Number of allowed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    /// Whether the set is empty (possible only after unwatching everything).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }

    /// Sorted copy of the allowed symbols.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        let mut symbols: Vec<_> = self.symbols.read().iter().cloned().collect();
        symbols.sort_unstable();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_folds_case_and_deduplicates() {
        let symbols = parse_symbol_list("BTCUSDT, btcusdt ,ETHUSDT").unwrap();
        let expected: HashSet<String> = ["btcusdt", "ethusdt"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(symbols, expected);
    }

    #[test]
    fn parse_empty_input_fails() {
        assert_eq!(parse_symbol_list(""), Err(SymbolSetError::Empty));
        assert_eq!(parse_symbol_list("  , ,  "), Err(SymbolSetError::Empty));
        assert_eq!(
            SymbolSetError::Empty.to_string(),
            "no symbol is requested"
        );
    }

    #[test]
    fn parse_rejects_more_than_max_streams() {
        let raw = (0..=MAX_STREAMS)
            .map(|i| format!("sym{i}"))
            .collect::<Vec<_>>()
            .join(",");

        let err = parse_symbol_list(&raw).unwrap_err();
        assert_eq!(err, SymbolSetError::TooMany(1025));
        assert!(err.to_string().contains("1025"));
    }

    #[test]
    fn parse_accepts_exactly_max_streams() {
        let raw = (0..MAX_STREAMS)
            .map(|i| format!("sym{i}"))
            .collect::<Vec<_>>()
            .join(",");

        assert_eq!(parse_symbol_list(&raw).unwrap().len(), MAX_STREAMS);
    }

    #[test]
    fn contains_is_case_insensitive() {
        let set = AllowedSymbolSet::parse("bnbbtc").unwrap();
        assert!(set.contains("BNBBTC"));
        assert!(set.contains("bnbbtc"));
        assert!(set.contains(" BnbBtc "));
        assert!(!set.contains("ETHBTC"));
    }

    #[test]
    fn watch_and_unwatch() {
        let set = AllowedSymbolSet::parse("bnbbtc").unwrap();

        assert!(set.watch("NEOBTC").unwrap());
        assert!(!set.watch("neobtc").unwrap());
        assert!(set.contains("NEOBTC"));

        assert!(set.unwatch("BNBBTC").unwrap());
        assert!(!set.unwatch("BNBBTC").unwrap());
        assert!(!set.contains("bnbbtc"));

        assert_eq!(set.snapshot(), vec!["neobtc".to_string()]);
    }

    #[test]
    fn watch_rejects_blank_symbol() {
        let set = AllowedSymbolSet::parse("bnbbtc").unwrap();
        assert!(matches!(
            set.watch("   "),
            Err(SymbolSetError::InvalidSymbol(_))
        ));
        assert!(matches!(
            set.unwatch(""),
            Err(SymbolSetError::InvalidSymbol(_))
        ));
    }

    #[test]
    fn watch_refuses_to_grow_past_limit() {
        let set = AllowedSymbolSet::from_symbols((0..MAX_STREAMS).map(|i| format!("sym{i}")))
            .unwrap();
        assert_eq!(
            set.watch("another"),
            Err(SymbolSetError::TooMany(MAX_STREAMS + 1))
        );
        // Re-watching an existing symbol is still fine.
        assert_eq!(set.watch("sym0"), Ok(false));
    }

    #[test]
    fn unwatching_everything_leaves_empty_set() {
        let set = AllowedSymbolSet::parse("bnbbtc").unwrap();
        set.unwatch("bnbbtc").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn concurrent_watch_and_contains() {
        let set = Arc::new(AllowedSymbolSet::parse("bnbbtc").unwrap());

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let symbol = format!("w{t}s{i}");
                        set.watch(&symbol).unwrap();
                        assert!(set.contains(&symbol.to_uppercase()));
                        set.unwatch(&symbol).unwrap();
                    }
                })
            })
            .collect();

        for handle in writers {
            handle.join().unwrap();
        }

        assert_eq!(set.snapshot(), vec!["bnbbtc".to_string()]);
    }

    proptest! {
        #[test]
        fn parse_is_case_and_order_independent(
            symbols in proptest::collection::vec("[a-z]{3,8}", 1..20)
        ) {
            let lower = symbols.join(",");
            let mut shuffled: Vec<_> = symbols.iter().rev().map(|s| format!("  {}  ", s.to_uppercase())).collect();
            shuffled.extend(symbols.iter().cloned());

            let a = parse_symbol_list(&lower).unwrap();
            let b = parse_symbol_list(&shuffled.join(",")).unwrap();
            prop_assert_eq!(&a, &b);

            let distinct: HashSet<_> = symbols.iter().cloned().collect();
            prop_assert_eq!(a.len(), distinct.len());
        }
    }
}
