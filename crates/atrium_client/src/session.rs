//! One room membership: motion, sampling, and remote entity state.
//!
//! A [`RoomSession`] owns every structure whose lifetime matches the
//! membership - the motion controller, the pose watch channel, the
//! sampler task, and the remote entity registry. Creating a session
//! emits the join message and starts the sampler; leaving (or dropping
//! the session) stops the sampler immediately and clears remote state.
//! Nothing here is process-wide.
//!
//! The embedding application supplies transport: it forwards
//! [`ClientMessage`] values from the session's outbound channel to the
//! wire, and hands every inbound frame to
//! [`handle_frame`](RoomSession::handle_frame).

use crate::entities::{EntityRegistry, InterpolationConfig, RenderedEntity};
use crate::motion::{MotionController, WallSegment};
use crate::transmitter::{LocalPose, SyncTransmitter, SAMPLE_INTERVAL};
use atrium_protocol::{
    decode_packed_snapshot, ClientMessage, EntityId, Position, RoomId, RoomSnapshot, ServerMessage,
};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

/// Client-side state for one joined room.
pub struct RoomSession {
    room_id: RoomId,
    entity_id: EntityId,
    motion: MotionController,
    entities: EntityRegistry,
    pose_tx: watch::Sender<LocalPose>,
    transmitter: SyncTransmitter,
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl RoomSession {
    /// Joins a room: emits the join message and starts the sampler.
    ///
    /// Returns the session and the receiver end of the outbound channel
    /// for the transport layer to drain.
    pub fn join(
        room_id: RoomId,
        entity_id: EntityId,
        display_name: String,
        auxiliary: serde_json::Value,
        start: Position,
        speed: f64,
    ) -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let _ = outbound.send(ClientMessage::JoinRoom {
            room_id: room_id.clone(),
            entity_id,
            display_name: display_name.clone(),
            auxiliary: auxiliary.clone(),
        });

        let motion = MotionController::new(start, speed);
        let (pose_tx, pose_rx) = watch::channel(LocalPose {
            position: motion.position(),
            direction: motion.direction(),
        });
        let transmitter = SyncTransmitter::spawn(
            room_id.clone(),
            entity_id,
            display_name,
            auxiliary,
            pose_rx,
            outbound.clone(),
            SAMPLE_INTERVAL,
        );

        let session = Self {
            room_id,
            entity_id,
            motion,
            entities: EntityRegistry::new(InterpolationConfig::default()),
            pose_tx,
            transmitter,
            outbound,
        };
        (session, outbound_rx)
    }

    /// Replaces the room collision geometry from the map collaborator.
    pub fn set_walls(&mut self, walls: Vec<WallSegment>) {
        self.motion.set_walls(walls);
    }

    /// Requests motion of the local entity toward a point.
    pub fn request_move(&mut self, target: Position) {
        self.motion.move_toward(target);
    }

    /// Advances local motion by `dt` and publishes the resulting pose
    /// for the sampler to read.
    pub fn motion_tick(&mut self, dt: Duration) {
        self.motion.tick(dt);
        self.pose_tx.send_replace(LocalPose {
            position: self.motion.position(),
            direction: self.motion.direction(),
        });
    }

    /// Handles one raw inbound text frame. Malformed frames are dropped
    /// silently with prior state retained.
    pub fn handle_frame(&mut self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => self.handle_server_message(message),
            Err(e) => trace!("Dropping malformed frame: {}", e),
        }
    }

    /// Dispatches one typed server message.
    pub fn handle_server_message(&mut self, message: ServerMessage) {
        let now = Instant::now();
        match message {
            ServerMessage::RoomSnapshot(snapshot) => self.apply_snapshot(snapshot, now),
            ServerMessage::CompactSnapshot(snapshot) => {
                self.apply_snapshot(snapshot.into(), now);
            }
            ServerMessage::PackedSnapshot { data } => match decode_packed_snapshot(&data) {
                Ok(snapshot) => self.apply_snapshot(snapshot.into(), now),
                Err(e) => trace!("Dropping undecodable packed snapshot: {}", e),
            },
            ServerMessage::HeartbeatProbe { timestamp } => {
                // Echo immediately; RTT measurement depends on it.
                let _ = self.outbound.send(ClientMessage::HeartbeatEcho { timestamp });
            }
            ServerMessage::EntityLeft { room_id, entity_id } => {
                if room_id == self.room_id {
                    self.entities.entity_left(entity_id);
                }
            }
            ServerMessage::RoomFull { room_id, capacity } => {
                warn!("🚪 Join rejected: room {} is full ({})", room_id, capacity);
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: RoomSnapshot, now: Instant) {
        if snapshot.room_id != self.room_id {
            trace!(
                "Dropping snapshot for room {} (joined to {})",
                snapshot.room_id,
                self.room_id
            );
            return;
        }
        // The local entity is rendered from the motion controller, not
        // from its own echoed samples.
        let own_id = self.entity_id;
        self.entities.apply_snapshot(
            snapshot
                .entities
                .into_iter()
                .filter(|entity| entity.entity_id != own_id),
            now,
        );
    }

    /// One render tick: advances interpolation, reaps stale entities,
    /// and returns the list for the drawing collaborator.
    pub fn render_tick(&mut self, dt: Duration) -> Vec<RenderedEntity> {
        self.entities.render_tick(Instant::now(), dt)
    }

    /// Leaves the room: stops the sampler immediately, announces the
    /// leave, and clears remote state. The session is spent afterwards.
    pub fn leave(mut self) {
        self.transmitter.stop();
        let _ = self.outbound.send(ClientMessage::LeaveRoom {
            room_id: self.room_id.clone(),
        });
        self.entities.clear();
        debug!("Left room {}", self.room_id);
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Current local position, read-only for collaborators.
    pub fn local_position(&self) -> Position {
        self.motion.position()
    }

    /// Whether the local entity has an in-flight motion request.
    pub fn local_is_moving(&self) -> bool {
        self.motion.is_moving()
    }

    /// Number of remote entities currently tracked.
    pub fn remote_entity_count(&self) -> usize {
        self.entities.len()
    }
}
