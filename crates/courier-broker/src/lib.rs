//! # courier-broker
//!
//! The Courier broker daemon: binds a TCP listener or a UDP socket,
//! drives the [`courier_core::Engine`] from a single event-loop task,
//! and fans published messages out to subscriber sessions.
//!
//! The binary lives in `main.rs`; everything else is a library so the
//! integration tests can run a real broker on an ephemeral port.

pub mod config;
pub mod metrics;
pub mod tcp;
pub mod udp;

pub use config::Config;
pub use tcp::StreamBroker;
pub use udp::DatagramBroker;
