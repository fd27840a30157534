//! TCP transport.
//!
//! Frames arrive as an ordered byte stream and are reassembled from a
//! receive accumulator, so a frame split across segments or several
//! frames coalesced into one read both decode correctly.

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::BytesMut;
use courier_protocol::{codec, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::traits::{Connection, TransportError};

/// Initial receive accumulator capacity.
const READ_BUF_CAPACITY: usize = 4096;

/// A framed TCP connection to the broker.
pub struct TcpConnection {
    stream: TcpStream,
    remote_addr: SocketAddr,
    read_buf: BytesMut,
}

impl TcpConnection {
    /// Connect to a broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connect fails.
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        debug!(broker = %addr, "tcp connected");

        Ok(Self {
            stream,
            remote_addr: addr,
            read_buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
        })
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let data = codec::encode(frame)?;
        self.stream.write_all(&data).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            if let Some(frame) = codec::decode_from(&mut self.read_buf)? {
                return Ok(Some(frame));
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                // Stream ended mid-frame.
                return Err(TransportError::ConnectionClosed);
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
