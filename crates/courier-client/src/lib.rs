//! # courier-client
//!
//! Client library for the Courier broker: a [`Publisher`] that pushes
//! messages on one channel and a [`Subscriber`] that receives
//! timestamped copies from the channels it registered for. Both work
//! over either transport.
//!
//! ```rust,ignore
//! use courier_client::{Publisher, Subscriber};
//! use courier_transport::TransportKind;
//!
//! let mut publisher =
//!     Publisher::connect(TransportKind::Tcp, addr, 5, "scores").await?;
//! publisher.publish("Gol de Tigres al minuto 12").await?;
//!
//! let mut subscriber =
//!     Subscriber::connect(TransportKind::Tcp, addr, vec![5], "ticker").await?;
//! while let Some(delivery) = subscriber.next_message().await? {
//!     println!("[{}] {:?}", delivery.channel, delivery.payload);
//! }
//! ```

pub mod feedgen;

pub use feedgen::FeedGenerator;

use std::net::SocketAddr;

use bytes::Bytes;
use courier_protocol::{ErrorCode, Frame, OpCode};
use courier_transport::{connect, Connection, TransportError, TransportKind};
use thiserror::Error;
use tracing::{debug, info};

/// Client-side errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The broker rejected the handshake.
    #[error("broker rejected handshake with status {0}")]
    HandshakeRejected(u8),

    /// The broker answered the handshake with something else entirely.
    #[error("unexpected {0:?} reply to handshake")]
    UnexpectedReply(OpCode),

    /// The broker reported an error.
    #[error("broker error: {0:?}")]
    Broker(ErrorCode),
}

/// A message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel the message was published on.
    pub channel: u8,
    /// Broker wall clock at routing time, milliseconds since the epoch.
    pub timestamp_ms: u64,
    /// Message payload.
    pub payload: Bytes,
}

/// Send a handshake and wait for the broker's acknowledgment.
async fn handshake(
    conn: &mut Box<dyn Connection>,
    frame: &Frame,
) -> Result<u64, ClientError> {
    conn.send(frame).await?;

    match conn.recv().await? {
        None => Err(TransportError::ConnectionClosed.into()),
        Some(Frame::HandshakeAck {
            status: 0,
            session_id,
        }) => Ok(session_id),
        Some(Frame::HandshakeAck { status, .. }) => Err(ClientError::HandshakeRejected(status)),
        Some(Frame::Error { code }) => Err(ClientError::Broker(code)),
        Some(other) => Err(ClientError::UnexpectedReply(other.opcode())),
    }
}

/// A publishing client bound to one channel.
pub struct Publisher {
    conn: Box<dyn Connection>,
    channel: u8,
    session_id: u64,
}

impl Publisher {
    /// Connect to a broker and register as a publisher on `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails.
    pub async fn connect(
        kind: TransportKind,
        addr: SocketAddr,
        channel: u8,
        client_id: &str,
    ) -> Result<Self, ClientError> {
        let mut conn = connect(kind, addr).await?;
        let session_id = handshake(&mut conn, &Frame::handshake_pub(channel, client_id)).await?;

        info!(broker = %addr, channel, session_id, "registered as publisher");
        Ok(Self {
            conn,
            channel,
            session_id,
        })
    }

    /// The session id assigned by the broker.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Publish one message on this publisher's channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn publish(&mut self, payload: impl Into<Bytes>) -> Result<(), ClientError> {
        self.conn
            .send(&Frame::publish(self.channel, payload.into()))
            .await?;
        Ok(())
    }

    /// Tell the broker we are leaving and close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the disconnect frame cannot be sent.
    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        self.conn.send(&Frame::Disconnect).await?;
        self.conn.close().await?;
        Ok(())
    }
}

/// A subscribing client.
pub struct Subscriber {
    conn: Box<dyn Connection>,
    session_id: u64,
}

impl Subscriber {
    /// Connect to a broker and register interest in `channels`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails.
    pub async fn connect(
        kind: TransportKind,
        addr: SocketAddr,
        channels: Vec<u8>,
        client_id: &str,
    ) -> Result<Self, ClientError> {
        let mut conn = connect(kind, addr).await?;
        let session_id =
            handshake(&mut conn, &Frame::handshake_sub(channels.clone(), client_id)).await?;

        info!(broker = %addr, ?channels, session_id, "registered as subscriber");
        Ok(Self { conn, session_id })
    }

    /// The session id assigned by the broker.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Wait for the next routed message.
    ///
    /// Returns `None` when the broker closes the connection. Control
    /// frames other than MESSAGE are handled internally.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a broker-reported error.
    pub async fn next_message(&mut self) -> Result<Option<Delivery>, ClientError> {
        loop {
            match self.conn.recv().await? {
                None => return Ok(None),
                Some(Frame::Message {
                    channel,
                    timestamp_ms,
                    payload,
                }) => {
                    return Ok(Some(Delivery {
                        channel,
                        timestamp_ms,
                        payload,
                    }))
                }
                Some(Frame::Disconnect) => return Ok(None),
                Some(Frame::Error { code }) => return Err(ClientError::Broker(code)),
                Some(other) => {
                    debug!(opcode = ?other.opcode(), "ignoring frame");
                }
            }
        }
    }

    /// Add a channel to this subscriber's interest set.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn subscribe(&mut self, channel: u8) -> Result<(), ClientError> {
        self.conn.send(&Frame::Subscribe { channel }).await?;
        Ok(())
    }

    /// Remove a channel from this subscriber's interest set.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn unsubscribe(&mut self, channel: u8) -> Result<(), ClientError> {
        self.conn.send(&Frame::Unsubscribe { channel }).await?;
        Ok(())
    }

    /// Tell the broker we are leaving and close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the disconnect frame cannot be sent.
    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        self.conn.send(&Frame::Disconnect).await?;
        self.conn.close().await?;
        Ok(())
    }
}
