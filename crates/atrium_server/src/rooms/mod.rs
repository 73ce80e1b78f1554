//! Per-room sample aggregation.
//!
//! Each room owns a last-write-wins buffer of its entities' most recent
//! samples plus its member list. Rooms are created on first join and
//! destroyed when their last member leaves; each room sits behind its own
//! lock so cross-room work never contends.

pub mod buffer;
pub mod registry;

pub use buffer::RoomBuffer;
pub use registry::{Room, RoomJoinError, RoomRegistry};
