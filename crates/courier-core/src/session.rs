//! Per-client session state.
//!
//! A session is the broker's record of one connected client: its role,
//! lifecycle state, channel interest, receive accumulator (stream
//! transport only), and bounded outbound queue.

use bytes::{Bytes, BytesMut};
use courier_protocol::{HEADER_SIZE, MAX_PAYLOAD_SIZE};
use tokio::sync::mpsc;

use crate::channels::ChannelSet;

/// Outbound queue capacity per session, in frames.
pub const SEND_QUEUE_CAP: usize = 256;

/// Receive accumulator cap while in handshake.
pub const HANDSHAKE_ACCUM_LIMIT: usize = 1024;

/// Receive accumulator cap once ready: one maximal frame.
pub const RECV_ACCUM_LIMIT: usize = MAX_PAYLOAD_SIZE + HEADER_SIZE;

/// What a client is to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unknown,
    Publisher,
    Subscriber,
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a handshake frame.
    Handshake,
    /// Handshake complete; pub/sub traffic flows.
    Ready,
    /// Tear down at the next opportunity.
    Closing,
}

/// A bounded FIFO of encoded outbound frames.
///
/// Pushes never block: a frame offered to a full queue is dropped and
/// counted. The receiving half is drained by the session's writer task.
#[derive(Debug)]
pub struct SendQueue {
    tx: mpsc::Sender<Bytes>,
    dropped: u64,
}

impl SendQueue {
    /// Create a queue with [`SEND_QUEUE_CAP`] slots, returning the
    /// drain half for the writer task.
    #[must_use]
    pub fn bounded() -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAP);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Enqueue an encoded frame.
    ///
    /// Returns `false` if the frame was dropped (queue full or writer
    /// gone).
    pub fn push(&mut self, frame: Bytes) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped += 1;
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Frames dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// One client as seen by the broker.
#[derive(Debug)]
pub struct Session {
    pub role: Role,
    pub state: SessionState,
    pub client_id: String,
    pub session_id: Option<u64>,
    pub channels: ChannelSet,
    pub recv_buf: BytesMut,
    pub outbound: SendQueue,
}

impl Session {
    /// Create a session in the handshake state.
    #[must_use]
    pub fn new(outbound: SendQueue) -> Self {
        Self {
            role: Role::Unknown,
            state: SessionState::Handshake,
            client_id: String::new(),
            session_id: None,
            channels: ChannelSet::new(),
            recv_buf: BytesMut::new(),
            outbound,
        }
    }

    /// Accumulator cap for the current lifecycle state.
    #[must_use]
    pub fn recv_limit(&self) -> usize {
        match self.state {
            SessionState::Handshake => HANDSHAKE_ACCUM_LIMIT,
            _ => RECV_ACCUM_LIMIT,
        }
    }
}
