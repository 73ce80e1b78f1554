//! Heartbeat probing for network quality measurement.
//!
//! One cycle per heartbeat interval: first sweep probes that outlived the
//! interval (each counts as exactly one loss sample and is abandoned,
//! never retried), then send every tracked connection a fresh probe
//! carrying the current server timestamp. Echoes are recorded by the
//! message router as they arrive, independent of this cycle.

use crate::connection::ConnectionManager;
use crate::quality::QualityEstimator;
use crate::stats::SyncStats;
use atrium_protocol::{current_timestamp, ServerMessage};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// Sends heartbeat probes and expires unanswered ones.
#[derive(Debug)]
pub struct HeartbeatService {
    connections: Arc<ConnectionManager>,
    quality: Arc<QualityEstimator>,
    stats: Arc<RwLock<SyncStats>>,
}

impl HeartbeatService {
    pub fn new(
        connections: Arc<ConnectionManager>,
        quality: Arc<QualityEstimator>,
        stats: Arc<RwLock<SyncStats>>,
    ) -> Self {
        Self {
            connections,
            quality,
            stats,
        }
    }

    /// Runs one heartbeat cycle: sweep expired probes, then probe every
    /// connection.
    pub async fn run_cycle(&self) {
        self.quality.sweep_expired().await;

        let connection_ids = self.connections.connection_ids().await;
        if connection_ids.is_empty() {
            return;
        }

        let mut probes_sent = 0u64;
        for connection_id in connection_ids {
            let timestamp = current_timestamp();
            let frame = match serde_json::to_string(&ServerMessage::HeartbeatProbe { timestamp }) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Failed to serialize heartbeat probe: {}", e);
                    continue;
                }
            };
            self.quality.record_probe(connection_id, timestamp).await;
            self.connections.send_to_connection(connection_id, frame).await;
            probes_sent += 1;
        }
        trace!("💓 Sent {} heartbeat probes", probes_sent);

        let mut stats = self.stats.write().await;
        stats.probes_sent += probes_sent;
    }
}
