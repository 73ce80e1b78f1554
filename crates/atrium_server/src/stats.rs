//! Synchronization statistics for monitoring and tests.

use serde::{Deserialize, Serialize};

/// Counters describing the sync workload since server start.
///
/// Updated by the message router, the broadcast scheduler, and the
/// heartbeat service; read by tests and the binary's shutdown summary.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SyncStats {
    /// Samples accepted into room buffers
    pub samples_received: u64,
    /// Samples dropped (malformed, unknown room, or identity mismatch)
    pub samples_dropped: u64,
    /// Room snapshots built and fanned out
    pub snapshots_sent: u64,
    /// Individual frames queued for delivery (several per snapshot on
    /// poor-tier connections)
    pub frames_sent: u64,
    /// Total bytes of frames queued for delivery
    pub bytes_sent: u64,
    /// Room broadcasts skipped because the adaptive interval had not
    /// elapsed
    pub broadcasts_skipped: u64,
    /// Buffer entries garbage-collected past the sample age window
    pub entities_reaped: u64,
    /// Heartbeat probes sent
    pub probes_sent: u64,
    /// Heartbeat echoes received
    pub echoes_received: u64,
}
