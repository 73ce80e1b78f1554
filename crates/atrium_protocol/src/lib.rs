//! # Atrium Protocol
//!
//! Shared types for the atrium room presence synchronization system. This
//! crate defines everything that crosses the wire between clients and the
//! server, plus the network-quality model both sides agree on:
//!
//! * **Core types** - [`EntityId`], [`RoomId`], [`Position`], [`Direction`]
//! * **Wire messages** - [`ClientMessage`] and [`ServerMessage`], closed
//!   tagged enums so routing is a single `match`, never string dispatch
//! * **Snapshot shaping** - full, compact-key, and deflate-packed snapshot
//!   encodings selected by a connection's quality tier
//! * **Quality model** - [`QualityTier`] classification from RTT and loss,
//!   and the tier-to-cadence policy
//!
//! The transport itself (WebSocket text frames) lives with the server and
//! client crates; everything here is transport-agnostic.

pub use codec::{decode_packed_snapshot, encode_snapshot, ProtocolError, POOR_TIER_BATCH_SIZE};
pub use messages::{
    ClientMessage, CompactEntity, CompactSnapshot, PositionSample, RoomSnapshot, ServerMessage,
    SnapshotEntity,
};
pub use quality::{ConnectionQuality, QualityTier};
pub use types::{current_timestamp, Direction, EntityId, Position, RoomId};

pub mod codec;
pub mod messages;
pub mod quality;
pub mod types;
