//! # courier-protocol
//!
//! Wire protocol definitions for the Courier pub/sub broker.
//!
//! This crate defines the binary protocol spoken between Courier clients
//! and brokers: the fixed 7-byte frame header, the opcode set, and the
//! encoding/decoding rules for each payload.
//!
//! ## Frame layout
//!
//! ```text
//! offset  bytes  field
//!  0      2      magic   (CA FE)
//!  2      1      opcode
//!  3      4      length  (little-endian payload length)
//!  7      ...    payload
//! ```
//!
//! ## Example
//!
//! ```rust
//! use courier_protocol::{codec, Frame};
//!
//! let frame = Frame::publish(5, b"goal!".as_ref());
//! let encoded = codec::encode(&frame).unwrap();
//!
//! let mut buf = bytes::BytesMut::from(&encoded[..]);
//! let decoded = codec::decode_from(&mut buf).unwrap().unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{
    decode_from, decode_raw, encode, encode_into, DecodeOutcome, ProtocolError, RawFrame,
    HEADER_SIZE, MAGIC, MAX_MESSAGE_SIZE, MAX_PAYLOAD_SIZE,
};
pub use frames::{ErrorCode, Frame, OpCode};
