//! # courier-core
//!
//! Session tracking, channel routing, and the broker engine for Courier.
//!
//! This crate provides the transport-agnostic building blocks:
//!
//! - **ChannelSet** - 256-bit bitmap of channel interest
//! - **RoutingTable** - channel id to subscriber-key fan-out index
//! - **Session** - per-client lifecycle, role, and bounded send queue
//! - **Engine** - the state machine gluing them together
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  bytes   ┌────────────┐  frames  ┌──────────────┐
//! │ I/O tasks  │─────────▶│   Engine   │─────────▶│ RoutingTable │
//! └────────────┘          └────────────┘          └──────────────┘
//!                               │ encoded frames
//!                               ▼
//!                        per-session send queues
//! ```
//!
//! The engine is single-owner: exactly one task holds it and feeds it
//! inbound events in arrival order, which is what makes the per-publisher
//! delivery order guarantee hold without locks.

pub mod channels;
pub mod engine;
pub mod routing;
pub mod session;

pub use channels::ChannelSet;
pub use engine::{Engine, EngineStats, SessionKey, SessionStatus};
pub use routing::RoutingTable;
pub use session::{Role, SendQueue, Session, SessionState, SEND_QUEUE_CAP};
