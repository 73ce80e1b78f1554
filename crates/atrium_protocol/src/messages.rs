//! Wire message definitions for client-server communication.
//!
//! Both directions of the wire are closed, internally tagged enums: every
//! message kind the system understands is listed here, and routing on
//! either side is a single `match`. Unknown or malformed messages fail to
//! deserialize and are dropped by the receiver with prior state retained.
//!
//! Snapshot payloads come in three shapes, selected per connection by its
//! quality tier:
//!
//! * [`RoomSnapshot`] - full field names, good connections
//! * [`CompactSnapshot`] - abbreviated keys, medium connections
//! * `packed-snapshot` - compact snapshot chunks, deflate-compressed and
//!   base64-wrapped so they still travel as text frames (poor connections)

use crate::types::{Direction, EntityId, Position, RoomId};
use serde::{Deserialize, Serialize};

/// One full-state sample of a single entity, sent by its owning client at
/// the sampler cadence.
///
/// Samples are fire-and-forget: there is no acknowledgment and no retry. A
/// lost sample is simply superseded by the next tick's sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSample {
    /// Room this sample belongs to
    pub room_id: RoomId,
    /// Entity being sampled
    pub entity_id: EntityId,
    /// Human-readable name shown next to the avatar
    pub display_name: String,
    /// Current position in room-local coordinates
    pub position: Position,
    /// Current facing direction
    pub direction: Direction,
    /// Opaque per-entity payload (e.g. avatar descriptor), relayed untouched
    #[serde(default)]
    pub auxiliary: serde_json::Value,
    /// Client clock at sampling time, Unix milliseconds
    pub timestamp: u64,
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Enter a room and start being synchronized to its members.
    JoinRoom {
        room_id: RoomId,
        entity_id: EntityId,
        display_name: String,
        #[serde(default)]
        auxiliary: serde_json::Value,
    },
    /// Leave the current room; tears down the server buffer entry
    /// immediately.
    LeaveRoom { room_id: RoomId },
    /// Periodic full-state position sample.
    PositionSample(PositionSample),
    /// Immediate reply to a `heartbeat-probe`, echoing its timestamp.
    HeartbeatEcho { timestamp: u64 },
}

/// One entity's entry in a full room snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub entity_id: EntityId,
    pub display_name: String,
    pub position: Position,
    pub direction: Direction,
    #[serde(default)]
    pub auxiliary: serde_json::Value,
    /// Client clock of the underlying sample, Unix milliseconds
    pub timestamp: u64,
}

/// Periodic full-key snapshot of a room's live entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub entities: Vec<SnapshotEntity>,
    /// Server clock at flush time, Unix milliseconds
    pub timestamp: u64,
}

/// One entity's entry in a compact snapshot. Same fields as
/// [`SnapshotEntity`] under single-letter keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactEntity {
    #[serde(rename = "i")]
    pub entity_id: EntityId,
    #[serde(rename = "n")]
    pub display_name: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "d")]
    pub direction: Direction,
    #[serde(rename = "a", default)]
    pub auxiliary: serde_json::Value,
    #[serde(rename = "t")]
    pub timestamp: u64,
}

/// Abbreviated-key snapshot for connections that should not pay for full
/// field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactSnapshot {
    #[serde(rename = "r")]
    pub room_id: RoomId,
    #[serde(rename = "e")]
    pub entities: Vec<CompactEntity>,
    #[serde(rename = "t")]
    pub timestamp: u64,
}

impl From<SnapshotEntity> for CompactEntity {
    fn from(entity: SnapshotEntity) -> Self {
        Self {
            entity_id: entity.entity_id,
            display_name: entity.display_name,
            x: entity.position.x,
            y: entity.position.y,
            direction: entity.direction,
            auxiliary: entity.auxiliary,
            timestamp: entity.timestamp,
        }
    }
}

impl From<CompactEntity> for SnapshotEntity {
    fn from(entity: CompactEntity) -> Self {
        Self {
            entity_id: entity.entity_id,
            display_name: entity.display_name,
            position: Position::new(entity.x, entity.y),
            direction: entity.direction,
            auxiliary: entity.auxiliary,
            timestamp: entity.timestamp,
        }
    }
}

impl From<RoomSnapshot> for CompactSnapshot {
    fn from(snapshot: RoomSnapshot) -> Self {
        Self {
            room_id: snapshot.room_id,
            entities: snapshot.entities.into_iter().map(Into::into).collect(),
            timestamp: snapshot.timestamp,
        }
    }
}

impl From<CompactSnapshot> for RoomSnapshot {
    fn from(snapshot: CompactSnapshot) -> Self {
        Self {
            room_id: snapshot.room_id,
            entities: snapshot.entities.into_iter().map(Into::into).collect(),
            timestamp: snapshot.timestamp,
        }
    }
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full-key room snapshot (good tier).
    RoomSnapshot(RoomSnapshot),
    /// Abbreviated-key room snapshot (medium tier).
    CompactSnapshot(CompactSnapshot),
    /// Deflate-compressed, base64-wrapped [`CompactSnapshot`] chunk
    /// (poor tier). Poor connections receive several small chunks rather
    /// than one large frame.
    PackedSnapshot { data: String },
    /// RTT probe; the client echoes `timestamp` back immediately.
    HeartbeatProbe { timestamp: u64 },
    /// Fast-path removal of an entity that explicitly left the room.
    EntityLeft { room_id: RoomId, entity_id: EntityId },
    /// Join rejected: the room is at its configured entity cap. The
    /// connection stays usable.
    RoomFull { room_id: RoomId, capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::current_timestamp;

    fn sample() -> PositionSample {
        PositionSample {
            room_id: RoomId::from("lobby"),
            entity_id: EntityId::new(),
            display_name: "ada".to_string(),
            position: Position::new(12.5, -3.0),
            direction: Direction::Left,
            auxiliary: serde_json::json!({ "avatar": "fox" }),
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn client_message_tags_are_kebab_case() {
        let json = serde_json::to_value(ClientMessage::PositionSample(sample())).unwrap();
        assert_eq!(json["type"], "position-sample");

        let json = serde_json::to_value(ClientMessage::HeartbeatEcho { timestamp: 7 }).unwrap();
        assert_eq!(json["type"], "heartbeat-echo");
    }

    #[test]
    fn server_message_round_trips() {
        let msg = ServerMessage::EntityLeft {
            room_id: RoomId::from("lobby"),
            entity_id: EntityId::new(),
        };
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("entity-left"));
        let back: ServerMessage = serde_json::from_str(&text).unwrap();
        assert!(matches!(back, ServerMessage::EntityLeft { .. }));
    }

    #[test]
    fn compact_entity_uses_short_keys() {
        let compact: CompactEntity = SnapshotEntity {
            entity_id: EntityId::new(),
            display_name: "ada".to_string(),
            position: Position::new(1.0, 2.0),
            direction: Direction::Up,
            auxiliary: serde_json::Value::Null,
            timestamp: 5,
        }
        .into();
        let json = serde_json::to_value(&compact).unwrap();
        assert!(json.get("x").is_some());
        assert!(json.get("n").is_some());
        assert!(json.get("display_name").is_none());
    }

    #[test]
    fn malformed_message_fails_to_parse() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"position-sample","room_id":"lobby"}"#);
        assert!(result.is_err());
    }
}
