//! Frame types for the Courier protocol.
//!
//! Frames are the fundamental unit of communication: a 7-byte header
//! followed by an opcode-specific payload.

use bytes::Bytes;

/// Frame opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Connection lifecycle
    HandshakePub = 0x01,
    HandshakeSub = 0x02,
    HandshakeAck = 0x03,
    Disconnect = 0x04,
    // Pub/sub operations
    Publish = 0x10,
    Subscribe = 0x11,
    Unsubscribe = 0x12,
    Message = 0x13,
    // Control
    Ping = 0x20,
    Pong = 0x21,
    // Error reporting
    Error = 0xFF,
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x01 => Ok(OpCode::HandshakePub),
            0x02 => Ok(OpCode::HandshakeSub),
            0x03 => Ok(OpCode::HandshakeAck),
            0x04 => Ok(OpCode::Disconnect),
            0x10 => Ok(OpCode::Publish),
            0x11 => Ok(OpCode::Subscribe),
            0x12 => Ok(OpCode::Unsubscribe),
            0x13 => Ok(OpCode::Message),
            0x20 => Ok(OpCode::Ping),
            0x21 => Ok(OpCode::Pong),
            0xFF => Ok(OpCode::Error),
            other => Err(other),
        }
    }
}

/// Error codes carried by [`Frame::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    InvalidHandshake = 0x01,
    ChannelNotFound = 0x02,
    MessageTooLarge = 0x03,
    RateLimitExceeded = 0x04,
    ProtocolVersionMismatch = 0x05,
    InvalidOpcode = 0x06,
    MalformedMessage = 0x07,
    Unauthorized = 0x08,
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x01 => Ok(ErrorCode::InvalidHandshake),
            0x02 => Ok(ErrorCode::ChannelNotFound),
            0x03 => Ok(ErrorCode::MessageTooLarge),
            0x04 => Ok(ErrorCode::RateLimitExceeded),
            0x05 => Ok(ErrorCode::ProtocolVersionMismatch),
            0x06 => Ok(ErrorCode::InvalidOpcode),
            0x07 => Ok(ErrorCode::MalformedMessage),
            0x08 => Ok(ErrorCode::Unauthorized),
            other => Err(other),
        }
    }
}

/// A protocol frame.
///
/// One variant per opcode. Handshake identifiers and channel lists are
/// length-prefixed with a single byte on the wire, so client ids are
/// capped at 255 bytes and a subscriber can declare at most 255 channels
/// in one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Publisher handshake: declares the one channel this client writes.
    HandshakePub { channel: u8, client_id: String },

    /// Subscriber handshake: declares the channels this client reads.
    HandshakeSub { channels: Vec<u8>, client_id: String },

    /// Broker acknowledgment of a handshake.
    HandshakeAck { status: u8, session_id: u64 },

    /// Orderly teardown, either direction.
    Disconnect,

    /// Publish a message on a channel.
    Publish { channel: u8, payload: Bytes },

    /// Add a channel to a subscriber's interest set.
    Subscribe { channel: u8 },

    /// Remove a channel from a subscriber's interest set.
    Unsubscribe { channel: u8 },

    /// A routed message delivered to a subscriber, stamped by the broker.
    Message {
        channel: u8,
        timestamp_ms: u64,
        payload: Bytes,
    },

    /// Keepalive probe.
    Ping,

    /// Keepalive reply.
    Pong,

    /// Error report.
    Error { code: ErrorCode },
}

impl Frame {
    /// Get the frame's opcode.
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        match self {
            Frame::HandshakePub { .. } => OpCode::HandshakePub,
            Frame::HandshakeSub { .. } => OpCode::HandshakeSub,
            Frame::HandshakeAck { .. } => OpCode::HandshakeAck,
            Frame::Disconnect => OpCode::Disconnect,
            Frame::Publish { .. } => OpCode::Publish,
            Frame::Subscribe { .. } => OpCode::Subscribe,
            Frame::Unsubscribe { .. } => OpCode::Unsubscribe,
            Frame::Message { .. } => OpCode::Message,
            Frame::Ping => OpCode::Ping,
            Frame::Pong => OpCode::Pong,
            Frame::Error { .. } => OpCode::Error,
        }
    }

    /// Create a publisher handshake frame.
    #[must_use]
    pub fn handshake_pub(channel: u8, client_id: impl Into<String>) -> Self {
        Frame::HandshakePub {
            channel,
            client_id: client_id.into(),
        }
    }

    /// Create a subscriber handshake frame.
    #[must_use]
    pub fn handshake_sub(channels: impl Into<Vec<u8>>, client_id: impl Into<String>) -> Self {
        Frame::HandshakeSub {
            channels: channels.into(),
            client_id: client_id.into(),
        }
    }

    /// Create a handshake acknowledgment.
    #[must_use]
    pub fn handshake_ack(status: u8, session_id: u64) -> Self {
        Frame::HandshakeAck { status, session_id }
    }

    /// Create a publish frame.
    #[must_use]
    pub fn publish(channel: u8, payload: impl Into<Bytes>) -> Self {
        Frame::Publish {
            channel,
            payload: payload.into(),
        }
    }

    /// Create a routed message frame.
    #[must_use]
    pub fn message(channel: u8, timestamp_ms: u64, payload: impl Into<Bytes>) -> Self {
        Frame::Message {
            channel,
            timestamp_ms,
            payload: payload.into(),
        }
    }

    /// Create an error frame.
    #[must_use]
    pub fn error(code: ErrorCode) -> Self {
        Frame::Error { code }
    }
}
