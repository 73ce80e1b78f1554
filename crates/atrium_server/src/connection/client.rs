//! Client connection representation and management.
//!
//! This module defines the structure and behavior of individual client
//! connections, tracking their state and metadata.

use atrium_protocol::{EntityId, RoomId};
use std::net::SocketAddr;
use std::time::SystemTime;

/// Represents an individual client connection to the server.
///
/// Tracks the essential information about a connected client: the entity
/// it drives (once it joins a room), its network address, connection
/// timing, and current room membership.
#[derive(Debug)]
pub struct ClientConnection {
    /// The entity this connection drives (None until it joins a room)
    pub entity_id: Option<EntityId>,

    /// Display name announced at join time
    pub display_name: Option<String>,

    /// Room the connection currently belongs to, if any
    pub room: Option<RoomId>,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,
}

impl ClientConnection {
    /// Creates a new client connection with the specified remote address.
    ///
    /// The connection starts without an entity identity or room; both are
    /// assigned when the client sends its join message.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            entity_id: None,
            display_name: None,
            room: None,
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }
}
