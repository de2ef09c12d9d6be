//! Application Layer
//!
//! Ports, the trade queue and the services that drive the relay.

pub mod ports;
pub mod queue;
pub mod services;
