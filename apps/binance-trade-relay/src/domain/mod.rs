//! Domain Layer - Core relay types and business rules.
//!
//! This layer contains the trade payloads, the symbol allow-list and the
//! termination primitives with no I/O dependencies.

/// Trade stream payloads (trade events, stream envelopes).
pub mod trade;

/// Symbol allow-list.
pub mod symbols;

/// Termination signal and shutdown phases.
pub mod shutdown;
