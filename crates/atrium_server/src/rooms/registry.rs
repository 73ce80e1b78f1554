//! Room registry: creation, membership, and per-room locking.
//!
//! The registry maps room IDs to live rooms. Each room is behind its own
//! `RwLock`, so inbound sample handlers and the flush cycle contend only
//! within a room, and cross-room work shares no lock at all. Rooms exist
//! exactly as long as they have members.

use super::buffer::RoomBuffer;
use crate::connection::ConnectionId;
use atrium_protocol::{EntityId, PositionSample, RoomId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Errors from room membership changes.
#[derive(Debug, thiserror::Error)]
pub enum RoomJoinError {
    /// The room is at its configured entity cap.
    #[error("Room {room_id} is full (capacity {capacity})")]
    Full { room_id: RoomId, capacity: usize },
}

/// One live room: its sample buffer, member connections, and broadcast
/// bookkeeping.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    buffer: RoomBuffer,
    members: HashMap<ConnectionId, EntityId>,
    last_broadcast: Option<Instant>,
}

impl Room {
    fn new(id: RoomId) -> Self {
        Self {
            id,
            buffer: RoomBuffer::new(),
            members: HashMap::new(),
            last_broadcast: None,
        }
    }

    /// Member connection IDs, in no particular order.
    pub fn member_connections(&self) -> Vec<ConnectionId> {
        self.members.keys().copied().collect()
    }

    /// The entity a member connection drives.
    pub fn entity_of(&self, connection_id: ConnectionId) -> Option<EntityId> {
        self.members.get(&connection_id).copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Applies a sample to the room buffer, last write winning.
    pub fn apply_sample(&mut self, sample: PositionSample) {
        self.buffer.apply(sample);
    }

    /// Drops an entity's buffer entry (explicit-leave fast path).
    pub fn remove_entity(&mut self, entity_id: EntityId) -> bool {
        self.buffer.remove(entity_id)
    }

    /// Snapshot material: entries newer than `max_age`, with older ones
    /// garbage-collected in the same pass.
    pub fn collect_fresh(&mut self, max_age: Duration, now: Instant) -> (Vec<PositionSample>, usize) {
        self.buffer.collect_fresh(max_age, now)
    }

    pub fn buffer_is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether the adaptive interval has elapsed since the last broadcast.
    /// A first broadcast is always due.
    pub fn broadcast_due(&self, interval: Duration, now: Instant) -> bool {
        match self.last_broadcast {
            Some(last) => now.duration_since(last) >= interval,
            None => true,
        }
    }

    /// Records a completed broadcast. Skipped cycles never call this, so
    /// a skipped broadcast does not push the next one out.
    pub fn mark_broadcast(&mut self, now: Instant) {
        self.last_broadcast = Some(now);
    }
}

/// Registry of all live rooms.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<RwLock<Room>>>,
    /// Hard cap on entities per room, the overload safety valve
    max_entities_per_room: usize,
}

impl RoomRegistry {
    pub fn new(max_entities_per_room: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            max_entities_per_room,
        }
    }

    /// Adds a connection's entity to a room, creating the room on first
    /// join. Rejects the join when the room is at capacity; the caller
    /// reports that back to the client and the connection stays usable.
    pub async fn join(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        entity_id: EntityId,
    ) -> Result<(), RoomJoinError> {
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("🏠 Room {} created", room_id);
                Arc::new(RwLock::new(Room::new(room_id.clone())))
            })
            .value()
            .clone();

        let mut room = room.write().await;
        if !room.members.contains_key(&connection_id)
            && room.members.len() >= self.max_entities_per_room
        {
            return Err(RoomJoinError::Full {
                room_id: room_id.clone(),
                capacity: self.max_entities_per_room,
            });
        }
        room.members.insert(connection_id, entity_id);
        debug!(
            "Entity {} joined room {} ({} members)",
            entity_id,
            room_id,
            room.members.len()
        );
        Ok(())
    }

    /// Removes a connection from a room, tearing down its entity's buffer
    /// entry immediately. The room itself is dropped once empty. Returns
    /// the entity that left, if the connection was a member.
    pub async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId) -> Option<EntityId> {
        let room = self.rooms.get(room_id)?.value().clone();
        let (entity_id, now_empty) = {
            let mut room = room.write().await;
            let entity_id = room.members.remove(&connection_id)?;
            room.buffer.remove(entity_id);
            debug!(
                "Entity {} left room {} ({} members remain)",
                entity_id,
                room_id,
                room.members.len()
            );
            (entity_id, room.members.is_empty())
        };
        if now_empty {
            // Re-check under the map entry so a concurrent join that
            // repopulated the room is not clobbered.
            let removed = self.rooms.remove_if(room_id, |_, room| {
                room.try_read().map(|r| r.members.is_empty()).unwrap_or(false)
            });
            if removed.is_some() {
                info!("🏠 Room {} destroyed (last member left)", room_id);
            }
        }
        Some(entity_id)
    }

    /// Applies a sample to its room's buffer. Returns false when the room
    /// does not exist (the sample is dropped silently; prior state stays).
    pub async fn apply_sample(&self, sample: PositionSample) -> bool {
        let Some(room) = self.rooms.get(&sample.room_id).map(|r| r.value().clone()) else {
            return false;
        };
        room.write().await.apply_sample(sample);
        true
    }

    /// Handle to one room, if it exists.
    pub fn room(&self, room_id: &RoomId) -> Option<Arc<RwLock<Room>>> {
        self.rooms.get(room_id).map(|r| r.value().clone())
    }

    /// Snapshot of all live rooms for the flush cycle to iterate.
    pub fn all_rooms(&self) -> Vec<Arc<RwLock<Room>>> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
