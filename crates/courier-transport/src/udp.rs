//! UDP transport.
//!
//! The socket is connected to the broker so plain `send`/`recv` apply;
//! each datagram carries exactly one frame. Delivery and ordering are
//! whatever the network provides.

use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use courier_protocol::{codec, Frame, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::traits::{Connection, TransportError};

/// A connected UDP socket speaking Courier frames.
pub struct UdpConnection {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    recv_buf: Vec<u8>,
}

impl UdpConnection {
    /// Bind an ephemeral local port and connect it to a broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or connected.
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect(addr).await?;
        debug!(broker = %addr, local = %socket.local_addr()?, "udp connected");

        Ok(Self {
            socket,
            remote_addr: addr,
            recv_buf: vec![0u8; HEADER_SIZE + MAX_PAYLOAD_SIZE],
        })
    }
}

#[async_trait]
impl Connection for UdpConnection {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let data = codec::encode(frame)?;
        self.socket.send(&data).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        let n = self.socket.recv(&mut self.recv_buf).await?;
        let frame = codec::decode(&self.recv_buf[..n])?;
        Ok(Some(frame))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Datagram sockets have nothing to shut down; the caller sends
        // DISCONNECT at the protocol level before dropping.
        Ok(())
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
