//! # Atrium Sync Client
//!
//! Client-side half of the atrium room presence synchronization system:
//!
//! * **Motion** - drives the local entity toward requested target points,
//!   stopping at walls, and derives its facing direction
//! * **Transmitter** - an independent fixed-cadence task that samples the
//!   current local pose and emits fire-and-forget position samples
//! * **Entities** - receiver-side registry: smooths remote entities
//!   toward their latest server positions and reaps silent ones
//! * **Session** - ties the three together for one room membership and
//!   dispatches inbound server messages
//!
//! The two periodic loops - the outbound sampler and the render tick -
//! are mutually independent; the only shared value (the local pose) is
//! published over a watch channel the sampler reads and never mutates.
//!
//! Transport is the embedding application's concern: the session emits
//! [`ClientMessage`](atrium_protocol::ClientMessage) values on a channel
//! and consumes [`ServerMessage`](atrium_protocol::ServerMessage) values
//! handed to it, keeping this crate transport-agnostic.

pub use entities::{EntityRecord, EntityRegistry, InterpolationConfig, RenderedEntity};
pub use motion::{MotionController, WallSegment};
pub use session::RoomSession;
pub use transmitter::{LocalPose, SyncTransmitter, SAMPLE_INTERVAL};

pub mod entities;
pub mod motion;
pub mod session;
pub mod transmitter;
