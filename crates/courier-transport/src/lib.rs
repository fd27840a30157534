//! # courier-transport
//!
//! Client-side transport abstraction for Courier.
//!
//! The broker speaks the same framing over two transports; this crate
//! gives clients a single [`Connection`] interface over both:
//!
//! - **TCP** - ordered byte stream, frames reassembled from a receive
//!   accumulator
//! - **UDP** - connected datagram socket, one frame per datagram
//!
//! ```rust,ignore
//! use courier_transport::{connect, TransportKind};
//!
//! let mut conn = connect(TransportKind::Tcp, "127.0.0.1:5000".parse()?).await?;
//! conn.send(&frame).await?;
//! while let Some(frame) = conn.recv().await? {
//!     // process frame
//! }
//! ```

pub mod tcp;
pub mod traits;
pub mod udp;

pub use tcp::TcpConnection;
pub use traits::{Connection, TransportError, TransportKind};
pub use udp::UdpConnection;

use std::net::SocketAddr;

/// Open a connection of the given kind to a broker address.
///
/// # Errors
///
/// Returns an error if the socket cannot be created or connected.
pub async fn connect(
    kind: TransportKind,
    addr: SocketAddr,
) -> Result<Box<dyn Connection>, TransportError> {
    Ok(match kind {
        TransportKind::Tcp => Box::new(TcpConnection::connect(addr).await?),
        TransportKind::Udp => Box::new(UdpConnection::connect(addr).await?),
    })
}
