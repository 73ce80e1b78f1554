//! Message routing logic for dispatching client messages.
//!
//! Incoming text frames parse into the closed [`ClientMessage`] enum and
//! dispatch through a single `match` - the complete set of message kinds
//! the server understands is visible in one place. A frame that fails to
//! parse is dropped with prior state retained; the sender's next sample
//! supersedes it anyway.

use crate::connection::{ConnectionId, ConnectionManager};
use crate::error::ServerError;
use crate::quality::QualityEstimator;
use crate::rooms::{RoomJoinError, RoomRegistry};
use crate::stats::SyncStats;
use atrium_protocol::{ClientMessage, EntityId, PositionSample, RoomId, ServerMessage};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

/// Routes parsed client messages to room, quality, and connection state.
#[derive(Debug)]
pub struct MessageRouter {
    connections: Arc<ConnectionManager>,
    rooms: Arc<RoomRegistry>,
    quality: Arc<QualityEstimator>,
    stats: Arc<RwLock<SyncStats>>,
}

impl MessageRouter {
    pub fn new(
        connections: Arc<ConnectionManager>,
        rooms: Arc<RoomRegistry>,
        quality: Arc<QualityEstimator>,
        stats: Arc<RwLock<SyncStats>>,
    ) -> Self {
        Self {
            connections,
            rooms,
            quality,
            stats,
        }
    }

    /// Parses and dispatches one raw text frame from a client.
    ///
    /// Returns an error only for frames that fail to parse; the caller
    /// logs it at trace level and the connection continues - malformed
    /// input never affects prior state.
    pub async fn route(&self, text: &str, connection_id: ConnectionId) -> Result<(), ServerError> {
        let message: ClientMessage = serde_json::from_str(text)
            .map_err(|e| ServerError::Network(format!("Invalid message: {e}")))?;

        match message {
            ClientMessage::JoinRoom {
                room_id,
                entity_id,
                display_name,
                auxiliary: _,
            } => {
                self.handle_join(connection_id, room_id, entity_id, display_name)
                    .await
            }
            ClientMessage::LeaveRoom { room_id } => {
                self.teardown_membership(connection_id, &room_id).await;
                Ok(())
            }
            ClientMessage::PositionSample(sample) => {
                self.handle_sample(connection_id, sample).await;
                Ok(())
            }
            ClientMessage::HeartbeatEcho { timestamp } => {
                self.quality.record_echo(connection_id, timestamp).await;
                let mut stats = self.stats.write().await;
                stats.echoes_received += 1;
                Ok(())
            }
        }
    }

    /// Tears down whatever room membership a connection holds. Called for
    /// explicit leaves and for disconnects; safe to call when the
    /// connection never joined.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        if let Some(room_id) = self.connections.get_room(connection_id).await {
            self.teardown_membership(connection_id, &room_id).await;
        }
        self.quality.forget(connection_id).await;
    }

    async fn handle_join(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        entity_id: EntityId,
        display_name: String,
    ) -> Result<(), ServerError> {
        // A join supersedes any existing membership.
        if let Some(previous) = self.connections.get_room(connection_id).await {
            if previous != room_id {
                self.teardown_membership(connection_id, &previous).await;
            }
        }

        match self.rooms.join(&room_id, connection_id, entity_id).await {
            Ok(()) => {
                debug!(
                    "🚪 Connection {} joined room {} as entity {}",
                    connection_id, room_id, entity_id
                );
                self.connections
                    .set_identity(connection_id, entity_id, display_name)
                    .await;
                self.connections
                    .set_room(connection_id, Some(room_id))
                    .await;
                self.quality.track(connection_id).await;
                Ok(())
            }
            Err(RoomJoinError::Full { room_id, capacity }) => {
                warn!(
                    "🚪 Join rejected: room {} is at capacity {}",
                    room_id, capacity
                );
                self.send_message(
                    connection_id,
                    &ServerMessage::RoomFull { room_id, capacity },
                )
                .await;
                Ok(())
            }
        }
    }

    async fn handle_sample(&self, connection_id: ConnectionId, sample: PositionSample) {
        // A sample must come from the connection that owns the entity and
        // match its joined room; anything else is dropped with prior
        // state retained.
        let joined_room = self.connections.get_room(connection_id).await;
        let owned_entity = self.connections.get_entity_id(connection_id).await;
        if joined_room.as_ref() != Some(&sample.room_id) || owned_entity != Some(sample.entity_id) {
            trace!(
                "Dropping sample from connection {}: not a member of {} as {}",
                connection_id,
                sample.room_id,
                sample.entity_id
            );
            let mut stats = self.stats.write().await;
            stats.samples_dropped += 1;
            return;
        }

        if self.rooms.apply_sample(sample).await {
            let mut stats = self.stats.write().await;
            stats.samples_received += 1;
        } else {
            let mut stats = self.stats.write().await;
            stats.samples_dropped += 1;
        }
    }

    /// Removes a connection from a room and announces the departure to
    /// the remaining members - the fast removal path, so receivers do not
    /// wait out the staleness timeout.
    async fn teardown_membership(&self, connection_id: ConnectionId, room_id: &RoomId) {
        let Some(entity_id) = self.rooms.leave(room_id, connection_id).await else {
            return;
        };
        self.connections.set_room(connection_id, None).await;

        if let Some(room) = self.rooms.room(room_id) {
            let members = room.read().await.member_connections();
            let message = ServerMessage::EntityLeft {
                room_id: room_id.clone(),
                entity_id,
            };
            for member in members {
                self.send_message(member, &message).await;
            }
        }
    }

    async fn send_message(&self, connection_id: ConnectionId, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(frame) => self.connections.send_to_connection(connection_id, frame).await,
            Err(e) => warn!("Failed to serialize server message: {}", e),
        }
    }
}
