//! Transport traits and errors.
//!
//! [`Connection`] is the seam that keeps client code transport-agnostic:
//! the publisher and subscriber libraries speak frames, not sockets.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use async_trait::async_trait;
use courier_protocol::{Frame, ProtocolError};
use thiserror::Error;

/// Which transport a client uses to reach the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            other => Err(format!("unknown transport '{other}' (expected tcp or udp)")),
        }
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bidirectional frame pipe to the broker.
#[async_trait]
pub trait Connection: Send {
    /// Send one frame.
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Receive the next frame.
    ///
    /// Returns `None` when the connection is closed cleanly.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// The broker's address.
    fn remote_addr(&self) -> SocketAddr;
}
