//! Adaptive broadcast scheduling: the periodic flush cycle.
//!
//! Each cycle iterates all live rooms. Per room, the arithmetic mean RTT
//! of its current members selects the room-wide broadcast interval; a room
//! whose interval has not elapsed since its last broadcast is skipped
//! outright - cadence drops, nothing backs up. Per member connection, that
//! connection's own quality tier selects the payload shape it receives.
//!
//! Cadence and payload policy are deliberately independent: the room
//! degrades together (everyone sees the same update rate), while payload
//! cost degrades per connection.

use crate::connection::ConnectionManager;
use crate::error::ServerError;
use crate::quality::QualityEstimator;
use crate::rooms::{Room, RoomRegistry};
use crate::stats::SyncStats;
use atrium_protocol::{
    current_timestamp, encode_snapshot, PositionSample, QualityTier, RoomSnapshot, SnapshotEntity,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{trace, warn};

/// Drives room flushes at adaptive cadence with per-connection payload
/// shaping.
#[derive(Debug)]
pub struct BroadcastScheduler {
    rooms: Arc<RoomRegistry>,
    quality: Arc<QualityEstimator>,
    connections: Arc<ConnectionManager>,
    stats: Arc<RwLock<SyncStats>>,
    /// Buffer entries older than this are dropped at flush time
    max_sample_age: Duration,
}

impl BroadcastScheduler {
    pub fn new(
        rooms: Arc<RoomRegistry>,
        quality: Arc<QualityEstimator>,
        connections: Arc<ConnectionManager>,
        stats: Arc<RwLock<SyncStats>>,
        max_sample_age: Duration,
    ) -> Self {
        Self {
            rooms,
            quality,
            connections,
            stats,
            max_sample_age,
        }
    }

    /// Runs one flush cycle over every live room.
    ///
    /// Room failures are logged and do not stop the cycle; the next tick
    /// retries with strictly newer state.
    pub async fn run_cycle(&self) {
        let now = Instant::now();
        for room in self.rooms.all_rooms() {
            if let Err(e) = self.flush_room(room, now).await {
                warn!("Room flush failed: {}", e);
            }
        }
    }

    /// Flushes a single room if its adaptive interval has elapsed.
    async fn flush_room(&self, room: Arc<RwLock<Room>>, now: Instant) -> Result<(), ServerError> {
        let members = {
            let room = room.read().await;
            if room.buffer_is_empty() {
                return Ok(());
            }
            room.member_connections()
        };
        if members.is_empty() {
            return Ok(());
        }

        // Room-wide cadence from the mean of member RTTs.
        let (mean_rtt, mean_loss) = self.quality.room_mean(&members).await;
        let interval = QualityTier::classify(mean_rtt, mean_loss).broadcast_interval();

        let (room_id, samples, reaped) = {
            let mut room = room.write().await;
            if !room.broadcast_due(interval, now) {
                drop(room);
                let mut stats = self.stats.write().await;
                stats.broadcasts_skipped += 1;
                return Ok(());
            }
            let (samples, reaped) = room.collect_fresh(self.max_sample_age, now);
            if !samples.is_empty() {
                room.mark_broadcast(now);
            }
            (room.id.clone(), samples, reaped)
        };

        if reaped > 0 {
            let mut stats = self.stats.write().await;
            stats.entities_reaped += reaped as u64;
        }
        if samples.is_empty() {
            return Ok(());
        }

        let snapshot = build_snapshot(room_id, samples);
        trace!(
            "📡 Broadcasting room {} snapshot: {} entities, interval {:?}",
            snapshot.room_id,
            snapshot.entities.len(),
            interval
        );

        // Per-connection payload shape from that connection's own tier.
        let mut frames_sent = 0u64;
        let mut bytes_sent = 0u64;
        for connection_id in members {
            let tier = self.quality.quality(connection_id).await.tier;
            let frames = encode_snapshot(&snapshot, tier)?;
            for frame in frames {
                bytes_sent += frame.len() as u64;
                frames_sent += 1;
                self.connections.send_to_connection(connection_id, frame).await;
            }
        }

        let mut stats = self.stats.write().await;
        stats.snapshots_sent += 1;
        stats.frames_sent += frames_sent;
        stats.bytes_sent += bytes_sent;
        Ok(())
    }
}

fn build_snapshot(room_id: atrium_protocol::RoomId, samples: Vec<PositionSample>) -> RoomSnapshot {
    let entities = samples
        .into_iter()
        .map(|sample| SnapshotEntity {
            entity_id: sample.entity_id,
            display_name: sample.display_name,
            position: sample.position,
            direction: sample.direction,
            auxiliary: sample.auxiliary,
            timestamp: sample.timestamp,
        })
        .collect();
    RoomSnapshot {
        room_id,
        entities,
        timestamp: current_timestamp(),
    }
}
