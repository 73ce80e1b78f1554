//! # Atrium Sync Server
//!
//! A room presence synchronization server. Clients join rooms, stream
//! position samples at a fixed cadence, and receive periodic room
//! snapshots whose cadence and payload shape adapt to measured network
//! quality.
//!
//! ## Architecture Overview
//!
//! * **Connection Manager** - WebSocket lifecycle, identity mapping, and
//!   outbound message fanout
//! * **Room Registry** - per-room last-write-wins sample buffers, each
//!   behind its own lock
//! * **Quality Estimator** - heartbeat probe/echo RTT and loss tracking
//!   per connection
//! * **Broadcast Scheduler** - the periodic flush cycle: mean-RTT room
//!   cadence, per-connection payload shaping, max-age garbage collection
//!
//! ## Message Flow
//!
//! 1. Client connects over WebSocket and sends `join-room`
//! 2. Position samples overwrite the entity's room buffer entry
//! 3. The flush cycle snapshots each non-empty room at its adaptive
//!    cadence and fans frames out per connection tier
//! 4. Heartbeat probes run independently; echoes update quality
//! 5. Leaving (or vanishing) tears the entity down everywhere
//!
//! ## Degradation Contract
//!
//! Backpressure is absorbed by lowering cadence and shrinking payloads,
//! never by queueing. A skipped broadcast is skipped forever; the next
//! cycle sends strictly newer state.

pub use config::{HeartbeatConfig, ServerConfig, SyncConfig};
pub use error::ServerError;
pub use server::SyncServer;
pub use stats::SyncStats;
pub use utils::{create_server, create_server_with_config};

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod quality;
pub mod rooms;
pub mod scheduler;
pub mod server;
pub mod stats;
pub mod utils;

// Internal modules (not part of public API)
mod connection;
mod messaging;

pub use connection::{ConnectionId, ConnectionManager};
