//! The broker engine.
//!
//! Transport-agnostic core of the broker: owns the session table, the
//! routing table, and the session id counter, and drives every state
//! transition. The engine is generic over the session key: an opaque
//! connection id for stream transports, a remote `SocketAddr` for
//! datagram transports.
//!
//! Exactly one task owns an engine and feeds it inbound events in
//! arrival order. All processing here is synchronous and bounded;
//! outbound frames go into per-session bounded queues and are drained
//! elsewhere.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use courier_protocol::{codec, ErrorCode, Frame, MAX_MESSAGE_SIZE};
use tracing::{debug, info, trace, warn};

use crate::routing::RoutingTable;
use crate::session::{Role, SendQueue, Session, SessionState};

/// Key identifying a session within one engine.
pub trait SessionKey: Copy + Eq + Hash + Display {}

impl<T: Copy + Eq + Hash + Display> SessionKey for T {}

/// Whether a session survived the event just processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Open,
    Closed,
}

/// Engine counters, exposed for logging and metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub frames_received: u64,
    /// MESSAGE frames enqueued to subscribers.
    pub messages_routed: u64,
    /// MESSAGE frames dropped on a full or dead subscriber queue.
    pub messages_dropped: u64,
    /// Publishes rejected for exceeding the message size limit.
    pub oversize_rejected: u64,
    /// Framing and payload-grammar errors.
    pub protocol_errors: u64,
}

/// The broker engine. See the module docs.
pub struct Engine<K: SessionKey> {
    sessions: HashMap<K, Session>,
    routing: RoutingTable<K>,
    next_session_id: u64,
    stats: EngineStats,
}

impl<K: SessionKey> Engine<K> {
    /// Create an empty engine. Session ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            routing: RoutingTable::new(),
            next_session_id: 1,
            stats: EngineStats::default(),
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Look up a session.
    #[must_use]
    pub fn session(&self, key: &K) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// The routing table.
    #[must_use]
    pub fn routing(&self) -> &RoutingTable<K> {
        &self.routing
    }

    /// Engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Register a freshly accepted stream connection.
    ///
    /// The session starts in the handshake state; `outbound` is the
    /// bounded queue its writer task drains.
    pub fn open_session(&mut self, key: K, outbound: SendQueue) {
        if self.sessions.insert(key, Session::new(outbound)).is_some() {
            warn!(session = %key, "replacing session with duplicate key");
        }
        self.stats.sessions_opened += 1;
        debug!(session = %key, "session opened");
    }

    /// Feed bytes received on a stream session.
    ///
    /// Appends to the session's receive accumulator and processes every
    /// complete frame. Framing errors, handshake violations, and
    /// accumulator overruns tear the session down; the caller must stop
    /// its I/O tasks when `Closed` is returned.
    pub fn on_data(&mut self, key: K, data: &[u8]) -> SessionStatus {
        let Some(session) = self.sessions.get_mut(&key) else {
            return SessionStatus::Closed;
        };
        session.recv_buf.extend_from_slice(data);

        loop {
            let frame = {
                let Some(session) = self.sessions.get_mut(&key) else {
                    return SessionStatus::Closed;
                };
                match codec::decode_from(&mut session.recv_buf) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        if session.recv_buf.len() > session.recv_limit() {
                            warn!(
                                session = %key,
                                buffered = session.recv_buf.len(),
                                "receive accumulator over limit, closing"
                            );
                            self.teardown(key);
                            return SessionStatus::Closed;
                        }
                        return SessionStatus::Open;
                    }
                    Err(err) => {
                        warn!(session = %key, error = %err, "framing error, closing");
                        self.stats.protocol_errors += 1;
                        self.teardown(key);
                        return SessionStatus::Closed;
                    }
                }
            };

            self.stats.frames_received += 1;
            if self.dispatch(key, frame) == SessionStatus::Closed {
                self.teardown(key);
                return SessionStatus::Closed;
            }
        }
    }

    /// Feed one datagram from `key`.
    ///
    /// A well-formed handshake frame from an unknown endpoint creates
    /// the session (`make_queue` supplies its outbound queue) and
    /// completes its handshake in one step. Anything else from an
    /// unknown endpoint, and any undecodable datagram, is discarded.
    pub fn on_datagram<F>(&mut self, key: K, data: &[u8], make_queue: F)
    where
        F: FnOnce() -> SendQueue,
    {
        let frame = match codec::decode(data) {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.protocol_errors += 1;
                debug!(session = %key, error = %err, "discarding undecodable datagram");
                return;
            }
        };

        if !self.sessions.contains_key(&key) {
            if !matches!(
                frame,
                Frame::HandshakePub { .. } | Frame::HandshakeSub { .. }
            ) {
                debug!(
                    session = %key,
                    opcode = ?frame.opcode(),
                    "dropping frame from unknown endpoint"
                );
                return;
            }
            self.sessions.insert(key, Session::new(make_queue()));
            self.stats.sessions_opened += 1;
            debug!(session = %key, "session opened");
        }

        self.stats.frames_received += 1;
        if self.dispatch(key, frame) == SessionStatus::Closed {
            self.teardown(key);
        }
    }

    /// Tear down a session from outside the state machine (reader hit
    /// EOF, writer failed, shutdown).
    pub fn close_session(&mut self, key: K) {
        self.teardown(key);
    }

    /// Apply one frame to a session's state machine.
    fn dispatch(&mut self, key: K, frame: Frame) -> SessionStatus {
        let Some(session) = self.sessions.get_mut(&key) else {
            return SessionStatus::Closed;
        };

        match session.state {
            SessionState::Handshake => match frame {
                Frame::HandshakePub { channel, client_id } => {
                    let session_id = self.next_session_id;
                    self.next_session_id += 1;

                    session.role = Role::Publisher;
                    session.state = SessionState::Ready;
                    session.channels.insert(channel);
                    session.client_id = client_id;
                    session.session_id = Some(session_id);

                    info!(
                        session = %key,
                        client = %session.client_id,
                        channel,
                        session_id,
                        "publisher registered"
                    );
                    Self::enqueue(session, &Frame::handshake_ack(0, session_id));
                    SessionStatus::Open
                }
                Frame::HandshakeSub {
                    channels,
                    client_id,
                } => {
                    let session_id = self.next_session_id;
                    self.next_session_id += 1;

                    session.role = Role::Subscriber;
                    session.state = SessionState::Ready;
                    session.client_id = client_id;
                    session.session_id = Some(session_id);
                    for channel in &channels {
                        session.channels.insert(*channel);
                        self.routing.insert(*channel, key);
                    }

                    info!(
                        session = %key,
                        client = %session.client_id,
                        channels = ?channels,
                        session_id,
                        "subscriber registered"
                    );
                    Self::enqueue(session, &Frame::handshake_ack(0, session_id));
                    SessionStatus::Open
                }
                other => {
                    debug!(
                        session = %key,
                        opcode = ?other.opcode(),
                        "unexpected frame during handshake, closing"
                    );
                    SessionStatus::Closed
                }
            },

            SessionState::Ready => match frame {
                Frame::Publish { channel, payload } => {
                    if session.role != Role::Publisher {
                        debug!(session = %key, "publish from non-publisher dropped");
                        return SessionStatus::Open;
                    }
                    if payload.len() > MAX_MESSAGE_SIZE {
                        warn!(
                            session = %key,
                            size = payload.len(),
                            "oversize publish rejected"
                        );
                        self.stats.oversize_rejected += 1;
                        Self::enqueue(session, &Frame::error(ErrorCode::MessageTooLarge));
                        return SessionStatus::Open;
                    }
                    self.route_publish(key, channel, payload);
                    SessionStatus::Open
                }
                Frame::Subscribe { channel } => {
                    if session.role == Role::Subscriber {
                        session.channels.insert(channel);
                        self.routing.insert(channel, key);
                        debug!(session = %key, channel, "subscribed");
                    } else {
                        debug!(session = %key, channel, "subscribe from non-subscriber dropped");
                    }
                    SessionStatus::Open
                }
                Frame::Unsubscribe { channel } => {
                    if session.role == Role::Subscriber {
                        session.channels.remove(channel);
                        self.routing.remove(channel, key);
                        debug!(session = %key, channel, "unsubscribed");
                    }
                    SessionStatus::Open
                }
                Frame::Ping => {
                    Self::enqueue(session, &Frame::Pong);
                    SessionStatus::Open
                }
                Frame::Disconnect => {
                    debug!(session = %key, client = %session.client_id, "disconnect requested");
                    SessionStatus::Closed
                }
                other => {
                    debug!(
                        session = %key,
                        opcode = ?other.opcode(),
                        "inappropriate frame dropped"
                    );
                    SessionStatus::Open
                }
            },

            SessionState::Closing => SessionStatus::Closed,
        }
    }

    /// Fan a published message out to every subscriber of `channel`
    /// except the sender.
    ///
    /// The message is stamped and encoded once; each subscriber gets a
    /// cheap handle on the same buffer. A full queue drops only that
    /// subscriber's copy.
    fn route_publish(&mut self, sender: K, channel: u8, payload: Bytes) {
        let frame = Frame::message(channel, now_ms(), payload);
        let encoded = match codec::encode(&frame) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(channel, error = %err, "failed to encode routed message");
                return;
            }
        };

        let targets: Vec<K> = self
            .routing
            .subscribers(channel)
            .iter()
            .copied()
            .filter(|k| *k != sender)
            .collect();

        let mut delivered = 0usize;
        for target in targets {
            if let Some(subscriber) = self.sessions.get_mut(&target) {
                if subscriber.outbound.push(encoded.clone()) {
                    delivered += 1;
                    self.stats.messages_routed += 1;
                } else {
                    self.stats.messages_dropped += 1;
                    debug!(session = %target, channel, "subscriber queue full, message dropped");
                }
            }
        }

        trace!(channel, delivered, "publish routed");
    }

    /// Encode and enqueue a control frame on a session's own queue.
    fn enqueue(session: &mut Session, frame: &Frame) {
        if let Ok(encoded) = codec::encode(frame) {
            session.outbound.push(encoded);
        }
    }

    /// Remove a session and scrub it from the routing table. Dropping
    /// the session releases its receive buffer and closes its queue.
    fn teardown(&mut self, key: K) {
        if let Some(session) = self.sessions.remove(&key) {
            self.routing.remove_session(key, &session.channels);
            self.stats.sessions_closed += 1;
            debug!(session = %key, client = %session.client_id, "session closed");
        }
    }
}

impl<K: SessionKey> Default for Engine<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
