//! Codec for encoding and decoding Courier frames.
//!
//! Every frame is a fixed 7-byte header followed by an opcode-specific
//! payload. The header carries the magic byte pair, the opcode, and the
//! payload length as a little-endian u32; payload integers are also
//! little-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frames::{ErrorCode, Frame, OpCode};

/// Magic byte pair opening every frame (reads as 0xCAFE).
pub const MAGIC: [u8; 2] = [0xCA, 0xFE];

/// Header size in bytes: magic(2) + opcode(1) + length(4).
pub const HEADER_SIZE: usize = 7;

/// Maximum frame payload size (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Maximum publishable message size.
///
/// A routed MESSAGE frame wraps the message in a 1-byte channel and an
/// 8-byte timestamp, and the inbound PUBLISH adds its own channel byte,
/// so the message itself is capped 10 bytes under the payload limit.
pub const MAX_MESSAGE_SIZE: usize = MAX_PAYLOAD_SIZE - 10;

/// Protocol errors raised during encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header magic did not match.
    #[error("bad frame magic")]
    BadMagic,

    /// Declared payload length exceeds the maximum.
    #[error("payload length {0} exceeds maximum {MAX_PAYLOAD_SIZE}")]
    PayloadTooLarge(usize),

    /// Not enough bytes for a complete frame.
    #[error("incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// Opcode byte is not part of the protocol.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// Payload does not match the opcode's grammar.
    #[error("malformed {0:?} payload")]
    Malformed(OpCode),

    /// Client identifier exceeds the 255-byte wire limit.
    #[error("client id of {0} bytes exceeds the 255-byte limit")]
    ClientIdTooLong(usize),

    /// Subscriber handshake declares more than 255 channels.
    #[error("channel list of {0} entries exceeds the 255-entry limit")]
    ChannelListTooLong(usize),
}

/// A decoded frame header plus a view over its payload bytes.
///
/// The payload borrows from the input buffer; callers copy what they
/// need before advancing by [`RawFrame::consumed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame<'a> {
    /// Raw opcode byte (not yet validated against [`OpCode`]).
    pub opcode: u8,
    /// Payload bytes.
    pub payload: &'a [u8],
    /// Total bytes the frame occupies, header included.
    pub consumed: usize,
}

/// Outcome of a non-destructive decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome<'a> {
    /// The buffer does not yet hold a complete frame.
    NeedMoreData,
    /// A complete frame.
    Frame(RawFrame<'a>),
}

/// Attempt to decode one frame header and payload view from `data`.
///
/// Does not consume input; the caller advances its buffer by
/// [`RawFrame::consumed`] after copying out what it needs.
///
/// # Errors
///
/// Returns an error if the header is complete but the magic mismatches
/// or the declared length exceeds [`MAX_PAYLOAD_SIZE`].
pub fn decode_raw(data: &[u8]) -> Result<DecodeOutcome<'_>, ProtocolError> {
    if data.len() < HEADER_SIZE {
        return Ok(DecodeOutcome::NeedMoreData);
    }

    if data[0..2] != MAGIC {
        return Err(ProtocolError::BadMagic);
    }

    let opcode = data[2];
    let length = u32::from_le_bytes([data[3], data[4], data[5], data[6]]) as usize;

    if length > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(length));
    }

    let consumed = HEADER_SIZE + length;
    if data.len() < consumed {
        return Ok(DecodeOutcome::NeedMoreData);
    }

    Ok(DecodeOutcome::Frame(RawFrame {
        opcode,
        payload: &data[HEADER_SIZE..consumed],
        consumed,
    }))
}

/// Decode one frame from `data`, which must hold it in full.
///
/// Trailing bytes beyond the first frame are ignored; this is the entry
/// point for datagram transports where one datagram carries one frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Incomplete`] if `data` is short, or any
/// header/payload error.
pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
    match decode_raw(data)? {
        DecodeOutcome::NeedMoreData => {
            let have = data.len();
            let need = if have < HEADER_SIZE {
                HEADER_SIZE - have
            } else {
                let length =
                    u32::from_le_bytes([data[3], data[4], data[5], data[6]]) as usize;
                HEADER_SIZE + length - have
            };
            Err(ProtocolError::Incomplete(need))
        }
        DecodeOutcome::Frame(raw) => parse_payload(raw.opcode, raw.payload),
    }
}

/// Try to decode a frame from a buffer, advancing it on success.
///
/// Returns `Ok(Some(frame))` if a complete frame was decoded,
/// `Ok(None)` if more data is needed, or `Err` on protocol error.
///
/// # Errors
///
/// Returns an error on bad magic, oversize length, unknown opcode, or a
/// payload that violates its opcode's grammar. The buffer is left
/// untouched on error.
pub fn decode_from(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    let (frame, consumed) = match decode_raw(buf)? {
        DecodeOutcome::NeedMoreData => return Ok(None),
        DecodeOutcome::Frame(raw) => (parse_payload(raw.opcode, raw.payload)?, raw.consumed),
    };

    buf.advance(consumed);
    Ok(Some(frame))
}

/// Parse an opcode-typed payload into a [`Frame`].
fn parse_payload(opcode: u8, payload: &[u8]) -> Result<Frame, ProtocolError> {
    let opcode = OpCode::try_from(opcode).map_err(ProtocolError::UnknownOpcode)?;
    let malformed = || ProtocolError::Malformed(opcode);

    match opcode {
        OpCode::HandshakePub => {
            // channel(1) + id_len(1) + client_id
            if payload.len() < 2 {
                return Err(malformed());
            }
            let channel = payload[0];
            let id_len = payload[1] as usize;
            if payload.len() != 2 + id_len {
                return Err(malformed());
            }
            let client_id =
                std::str::from_utf8(&payload[2..]).map_err(|_| malformed())?;
            Ok(Frame::handshake_pub(channel, client_id))
        }
        OpCode::HandshakeSub => {
            // chan_count(1) + channels + id_len(1) + client_id
            if payload.len() < 2 {
                return Err(malformed());
            }
            let chan_count = payload[0] as usize;
            if payload.len() < 1 + chan_count + 1 {
                return Err(malformed());
            }
            let channels = payload[1..1 + chan_count].to_vec();
            let id_len = payload[1 + chan_count] as usize;
            if payload.len() != 2 + chan_count + id_len {
                return Err(malformed());
            }
            let client_id =
                std::str::from_utf8(&payload[2 + chan_count..]).map_err(|_| malformed())?;
            Ok(Frame::handshake_sub(channels, client_id))
        }
        OpCode::HandshakeAck => {
            // status(1) + session_id(8)
            if payload.len() != 9 {
                return Err(malformed());
            }
            let session_id = u64::from_le_bytes(payload[1..9].try_into().unwrap());
            Ok(Frame::handshake_ack(payload[0], session_id))
        }
        OpCode::Disconnect => {
            if !payload.is_empty() {
                return Err(malformed());
            }
            Ok(Frame::Disconnect)
        }
        OpCode::Publish => {
            // channel(1) + message
            if payload.is_empty() {
                return Err(malformed());
            }
            Ok(Frame::publish(payload[0], Bytes::copy_from_slice(&payload[1..])))
        }
        OpCode::Subscribe => {
            if payload.len() != 1 {
                return Err(malformed());
            }
            Ok(Frame::Subscribe {
                channel: payload[0],
            })
        }
        OpCode::Unsubscribe => {
            if payload.len() != 1 {
                return Err(malformed());
            }
            Ok(Frame::Unsubscribe {
                channel: payload[0],
            })
        }
        OpCode::Message => {
            // channel(1) + timestamp(8) + message
            if payload.len() < 9 {
                return Err(malformed());
            }
            let timestamp_ms = u64::from_le_bytes(payload[1..9].try_into().unwrap());
            Ok(Frame::message(
                payload[0],
                timestamp_ms,
                Bytes::copy_from_slice(&payload[9..]),
            ))
        }
        OpCode::Ping => {
            if !payload.is_empty() {
                return Err(malformed());
            }
            Ok(Frame::Ping)
        }
        OpCode::Pong => {
            if !payload.is_empty() {
                return Err(malformed());
            }
            Ok(Frame::Pong)
        }
        OpCode::Error => {
            if payload.len() != 1 {
                return Err(malformed());
            }
            let code = ErrorCode::try_from(payload[0]).map_err(|_| malformed())?;
            Ok(Frame::error(code))
        }
    }
}

/// Exact encoded size of a frame, header included.
#[must_use]
pub fn encoded_len(frame: &Frame) -> usize {
    let payload_len = match frame {
        Frame::HandshakePub { client_id, .. } => 2 + client_id.len(),
        Frame::HandshakeSub {
            channels,
            client_id,
        } => 2 + channels.len() + client_id.len(),
        Frame::HandshakeAck { .. } => 9,
        Frame::Disconnect | Frame::Ping | Frame::Pong => 0,
        Frame::Publish { payload, .. } => 1 + payload.len(),
        Frame::Subscribe { .. } | Frame::Unsubscribe { .. } => 1,
        Frame::Message { payload, .. } => 9 + payload.len(),
        Frame::Error { .. } => 1,
    };
    HEADER_SIZE + payload_len
}

/// Encode a frame into an existing buffer.
///
/// Reserves the exact encoded size once and writes header then payload;
/// no intermediate allocation.
///
/// # Errors
///
/// Returns an error if a length-prefixed field overflows its prefix or
/// the payload would exceed [`MAX_PAYLOAD_SIZE`].
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let total = encoded_len(frame);
    let payload_len = total - HEADER_SIZE;

    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(payload_len));
    }
    match frame {
        Frame::HandshakePub { client_id, .. } | Frame::HandshakeSub { client_id, .. }
            if client_id.len() > u8::MAX as usize =>
        {
            return Err(ProtocolError::ClientIdTooLong(client_id.len()));
        }
        Frame::HandshakeSub { channels, .. } if channels.len() > u8::MAX as usize => {
            return Err(ProtocolError::ChannelListTooLong(channels.len()));
        }
        _ => {}
    }

    buf.reserve(total);
    buf.put_slice(&MAGIC);
    buf.put_u8(frame.opcode().into());
    buf.put_u32_le(payload_len as u32);

    match frame {
        Frame::HandshakePub { channel, client_id } => {
            buf.put_u8(*channel);
            buf.put_u8(client_id.len() as u8);
            buf.put_slice(client_id.as_bytes());
        }
        Frame::HandshakeSub {
            channels,
            client_id,
        } => {
            buf.put_u8(channels.len() as u8);
            buf.put_slice(channels);
            buf.put_u8(client_id.len() as u8);
            buf.put_slice(client_id.as_bytes());
        }
        Frame::HandshakeAck { status, session_id } => {
            buf.put_u8(*status);
            buf.put_u64_le(*session_id);
        }
        Frame::Disconnect | Frame::Ping | Frame::Pong => {}
        Frame::Publish { channel, payload } => {
            buf.put_u8(*channel);
            buf.put_slice(payload);
        }
        Frame::Subscribe { channel } | Frame::Unsubscribe { channel } => {
            buf.put_u8(*channel);
        }
        Frame::Message {
            channel,
            timestamp_ms,
            payload,
        } => {
            buf.put_u8(*channel);
            buf.put_u64_le(*timestamp_ms);
            buf.put_slice(payload);
        }
        Frame::Error { code } => {
            buf.put_u8((*code).into());
        }
    }

    Ok(())
}

/// Encode a frame to a freshly allocated buffer.
///
/// # Errors
///
/// Returns an error under the same conditions as [`encode_into`].
pub fn encode(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(encoded_len(frame));
    encode_into(frame, &mut buf)?;
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::handshake_pub(5, "scoreboard"),
            Frame::handshake_sub(vec![1, 2, 250], "ticker"),
            Frame::handshake_ack(0, 42),
            Frame::Disconnect,
            Frame::publish(7, b"Gol de Rayados al minuto 88".as_ref()),
            Frame::Subscribe { channel: 9 },
            Frame::Unsubscribe { channel: 9 },
            Frame::message(7, 1_700_000_000_123, b"kickoff".as_ref()),
            Frame::Ping,
            Frame::Pong,
            Frame::error(ErrorCode::MessageTooLarge),
        ]
    }

    #[test]
    fn encode_decode_roundtrip() {
        for frame in sample_frames() {
            let encoded = encode(&frame).unwrap();
            assert_eq!(encoded.len(), encoded_len(&frame));

            let mut buf = BytesMut::from(&encoded[..]);
            let decoded = decode_from(&mut buf).unwrap().unwrap();
            assert_eq!(frame, decoded);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn handshake_ack_wire_bytes() {
        let encoded = encode(&Frame::handshake_ack(0, 1)).unwrap();
        assert_eq!(
            &encoded[..],
            [
                0xCA, 0xFE, 0x03, 0x09, 0x00, 0x00, 0x00, // header
                0x00, // status
                0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // session id
            ]
        );
    }

    #[test]
    fn message_wire_layout() {
        let encoded = encode(&Frame::message(5, 0x0102_0304_0506_0708, b"hi".as_ref())).unwrap();
        assert_eq!(encoded[2], 0x13);
        assert_eq!(&encoded[3..7], &11u32.to_le_bytes());
        assert_eq!(encoded[7], 5);
        assert_eq!(&encoded[8..16], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(&encoded[16..], b"hi");
    }

    #[test]
    fn decode_needs_more_data() {
        let encoded = encode(&Frame::handshake_pub(1, "p")).unwrap();

        for cut in 0..encoded.len() {
            let mut buf = BytesMut::from(&encoded[..cut]);
            assert_eq!(decode_from(&mut buf).unwrap(), None, "cut at {cut}");
            assert_eq!(buf.len(), cut, "buffer must not advance at {cut}");
        }
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let data = [0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(decode_raw(&data), Err(ProtocolError::BadMagic));
    }

    #[test]
    fn decode_rejects_oversize_length() {
        let mut data = Vec::from(MAGIC);
        data.push(OpCode::Publish.into());
        data.extend_from_slice(&((MAX_PAYLOAD_SIZE as u32) + 1).to_le_bytes());
        assert_eq!(
            decode_raw(&data),
            Err(ProtocolError::PayloadTooLarge(MAX_PAYLOAD_SIZE + 1))
        );
    }

    #[test]
    fn decode_rejects_unknown_opcode() {
        let mut data = Vec::from(MAGIC);
        data.push(0x7E);
        data.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(decode(&data), Err(ProtocolError::UnknownOpcode(0x7E)));
    }

    #[test]
    fn decode_rejects_truncated_handshake_payload() {
        // id_len says 5 bytes but only 3 follow
        let frame = Frame::handshake_pub(1, "abcde");
        let encoded = encode(&frame).unwrap();
        let mut data = encoded.to_vec();
        data[3] = (data[3] as usize - 2) as u8; // shrink declared length
        data.truncate(data.len() - 2);
        assert_eq!(
            decode(&data),
            Err(ProtocolError::Malformed(OpCode::HandshakePub))
        );
    }

    #[test]
    fn decode_rejects_empty_publish() {
        let mut data = Vec::from(MAGIC);
        data.push(OpCode::Publish.into());
        data.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(decode(&data), Err(ProtocolError::Malformed(OpCode::Publish)));
    }

    #[test]
    fn publish_with_empty_message_is_valid() {
        let frame = Frame::publish(0, Bytes::new());
        let encoded = encode(&frame).unwrap();
        assert_eq!(decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn chunked_stream_yields_frames_in_order() {
        let frames = sample_frames();
        let mut wire = BytesMut::new();
        for frame in &frames {
            encode_into(frame, &mut wire).unwrap();
        }

        // Feed the stream one byte at a time.
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for byte in &wire[..] {
            buf.extend_from_slice(std::slice::from_ref(byte));
            while let Some(frame) = decode_from(&mut buf).unwrap() {
                decoded.push(frame);
            }
        }

        assert_eq!(decoded, frames);
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_oversize_client_id() {
        let frame = Frame::handshake_pub(0, "x".repeat(256));
        assert_eq!(encode(&frame), Err(ProtocolError::ClientIdTooLong(256)));
    }

    #[test]
    fn subscriber_handshake_with_empty_channel_list() {
        let frame = Frame::handshake_sub(Vec::new(), "idle");
        let encoded = encode(&frame).unwrap();
        assert_eq!(decode(&encoded).unwrap(), frame);
    }
}
