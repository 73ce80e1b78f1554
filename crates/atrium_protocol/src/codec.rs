//! Snapshot payload shaping and compaction.
//!
//! The scheduler picks a payload shape per connection from its quality
//! tier; this module turns a [`RoomSnapshot`] into the text frames for
//! that shape. Poor-tier frames are compact snapshots chunked into small
//! batches, deflate-compressed and base64-wrapped so they still travel as
//! WebSocket text frames.

use crate::messages::{CompactSnapshot, RoomSnapshot, ServerMessage};
use crate::quality::QualityTier;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use std::io::prelude::*;

/// Entities per poor-tier frame. Several small frames beat one large one
/// on a lossy link: a dropped frame costs a fraction of the room, and the
/// next flush supersedes it anyway.
pub const POOR_TIER_BATCH_SIZE: usize = 16;

/// Errors from snapshot encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Invalid packed payload: {0}")]
    InvalidPayload(String),
}

/// Encodes a room snapshot into one or more text frames for a connection
/// of the given tier.
///
/// * `Good` - one frame, full field names
/// * `Medium` - one frame, abbreviated keys
/// * `Poor` - compact entities chunked at [`POOR_TIER_BATCH_SIZE`], each
///   chunk deflated and base64-wrapped
pub fn encode_snapshot(
    snapshot: &RoomSnapshot,
    tier: QualityTier,
) -> Result<Vec<String>, ProtocolError> {
    match tier {
        QualityTier::Good => {
            let frame = to_frame(&ServerMessage::RoomSnapshot(snapshot.clone()))?;
            Ok(vec![frame])
        }
        QualityTier::Medium => {
            let compact = CompactSnapshot::from(snapshot.clone());
            let frame = to_frame(&ServerMessage::CompactSnapshot(compact))?;
            Ok(vec![frame])
        }
        QualityTier::Poor => {
            let compact = CompactSnapshot::from(snapshot.clone());
            let mut frames = Vec::new();
            for chunk in compact.entities.chunks(POOR_TIER_BATCH_SIZE) {
                let batch = CompactSnapshot {
                    room_id: compact.room_id.clone(),
                    entities: chunk.to_vec(),
                    timestamp: compact.timestamp,
                };
                let data = pack(&batch)?;
                frames.push(to_frame(&ServerMessage::PackedSnapshot { data })?);
            }
            Ok(frames)
        }
    }
}

/// Decodes the `data` field of a `packed-snapshot` message back into a
/// compact snapshot.
pub fn decode_packed_snapshot(data: &str) -> Result<CompactSnapshot, ProtocolError> {
    let compressed = BASE64
        .decode(data)
        .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
    let mut decoder = DeflateDecoder::new(compressed.as_slice());
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| ProtocolError::InvalidPayload(e.to_string()))
}

fn to_frame(message: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Serialization(e.to_string()))
}

fn pack(batch: &CompactSnapshot) -> Result<String, ProtocolError> {
    let json =
        serde_json::to_vec(batch).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(&json)
        .map_err(|e| ProtocolError::Compression(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| ProtocolError::Compression(e.to_string()))?;
    Ok(BASE64.encode(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SnapshotEntity;
    use crate::types::{current_timestamp, Direction, EntityId, Position, RoomId};

    fn snapshot(entity_count: usize) -> RoomSnapshot {
        let entities = (0..entity_count)
            .map(|n| SnapshotEntity {
                entity_id: EntityId::new(),
                display_name: format!("entity-{n}"),
                position: Position::new(n as f64, n as f64 * 2.0),
                direction: Direction::Right,
                auxiliary: serde_json::Value::Null,
                timestamp: current_timestamp(),
            })
            .collect();
        RoomSnapshot {
            room_id: RoomId::from("lobby"),
            entities,
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn good_tier_is_one_full_frame() {
        let frames = encode_snapshot(&snapshot(3), QualityTier::Good).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("room-snapshot"));
        assert!(frames[0].contains("display_name"));
    }

    #[test]
    fn medium_tier_uses_compact_keys() {
        let frames = encode_snapshot(&snapshot(3), QualityTier::Medium).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("compact-snapshot"));
        assert!(!frames[0].contains("display_name"));
    }

    #[test]
    fn poor_tier_chunks_and_round_trips() {
        let original = snapshot(POOR_TIER_BATCH_SIZE * 2 + 5);
        let frames = encode_snapshot(&original, QualityTier::Poor).unwrap();
        assert_eq!(frames.len(), 3);

        let mut recovered = 0;
        for frame in &frames {
            let msg: ServerMessage = serde_json::from_str(frame).unwrap();
            let ServerMessage::PackedSnapshot { data } = msg else {
                panic!("expected packed snapshot frame");
            };
            let batch = decode_packed_snapshot(&data).unwrap();
            assert_eq!(batch.room_id, original.room_id);
            recovered += batch.entities.len();
        }
        assert_eq!(recovered, original.entities.len());
    }

    #[test]
    fn garbage_packed_payload_is_an_error() {
        assert!(decode_packed_snapshot("not base64 at all!!").is_err());
    }
}
