//! Per-connection network quality estimation from heartbeat probes.
//!
//! The server periodically sends each connection a probe carrying its own
//! send timestamp; the client echoes it back immediately. RTT is receipt
//! time minus the echoed send time. Loss is the fraction of recent probes
//! that were never echoed within one heartbeat interval - such probes are
//! counted as exactly one loss sample and abandoned, never retried.

use crate::connection::ConnectionId;
use atrium_protocol::{current_timestamp, ConnectionQuality};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Probe bookkeeping for a single connection.
#[derive(Debug, Default)]
struct ProbeHistory {
    /// Probes sent but not yet echoed, keyed by their send timestamp,
    /// with the monotonic instant they were sent for timeout sweeping
    outstanding: HashMap<u64, Instant>,
    /// Outcome of the most recent probes, true = echoed in time
    outcomes: VecDeque<bool>,
    /// Smoothed round-trip time in milliseconds
    rtt_ms: Option<f64>,
}

impl ProbeHistory {
    fn record_outcome(&mut self, answered: bool, window: usize) {
        self.outcomes.push_back(answered);
        while self.outcomes.len() > window {
            self.outcomes.pop_front();
        }
    }

    fn loss_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let lost = self.outcomes.iter().filter(|answered| !**answered).count();
        lost as f64 / self.outcomes.len() as f64
    }
}

/// Tracks heartbeat RTT and loss per connection and classifies each into
/// a quality tier.
///
/// Echo handling is asynchronous with respect to the broadcast cycle: the
/// message router records echoes as they arrive, and the scheduler reads
/// whatever the latest measurements are.
#[derive(Debug)]
pub struct QualityEstimator {
    connections: Arc<RwLock<HashMap<ConnectionId, ProbeHistory>>>,
    /// Number of recent probes the loss ratio is computed over
    window: usize,
    /// A probe unanswered for this long counts as lost
    probe_timeout: Duration,
}

impl QualityEstimator {
    pub fn new(window: usize, probe_timeout: Duration) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            window,
            probe_timeout,
        }
    }

    /// Starts tracking a connection. Idempotent.
    pub async fn track(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        connections.entry(connection_id).or_default();
    }

    /// Stops tracking a connection; outstanding probes are abandoned.
    pub async fn forget(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        connections.remove(&connection_id);
    }

    /// Records that a probe with the given send timestamp went out.
    /// Starts tracking the connection if it was not tracked yet.
    pub async fn record_probe(&self, connection_id: ConnectionId, timestamp: u64) {
        let mut connections = self.connections.write().await;
        connections
            .entry(connection_id)
            .or_default()
            .outstanding
            .insert(timestamp, Instant::now());
    }

    /// Records an echo for a previously sent probe.
    ///
    /// RTT is the wall-clock difference between now and the echoed send
    /// timestamp, folded into an exponential moving average. An echo for
    /// a probe already swept as lost is ignored - the loss sample stands.
    pub async fn record_echo(&self, connection_id: ConnectionId, timestamp: u64) {
        let now = current_timestamp();
        let mut connections = self.connections.write().await;
        let Some(history) = connections.get_mut(&connection_id) else {
            return;
        };
        if history.outstanding.remove(&timestamp).is_none() {
            debug!(
                "Late echo from connection {} for probe {} ignored",
                connection_id, timestamp
            );
            return;
        }
        let rtt = now.saturating_sub(timestamp) as f64;
        history.rtt_ms = Some(match history.rtt_ms {
            Some(avg) => avg * 0.9 + rtt * 0.1,
            None => rtt,
        });
        let window = self.window;
        history.record_outcome(true, window);
    }

    /// Sweeps outstanding probes older than the probe timeout, counting
    /// each as one loss sample. Dead connections' probes disappear with
    /// their history in [`forget`](Self::forget) and are never counted.
    pub async fn sweep_expired(&self) {
        let now = Instant::now();
        let mut connections = self.connections.write().await;
        for (connection_id, history) in connections.iter_mut() {
            let expired: Vec<u64> = history
                .outstanding
                .iter()
                .filter(|(_, sent_at)| now.duration_since(**sent_at) >= self.probe_timeout)
                .map(|(ts, _)| *ts)
                .collect();
            for timestamp in expired {
                history.outstanding.remove(&timestamp);
                history.record_outcome(false, self.window);
                debug!(
                    "Probe {} to connection {} timed out",
                    timestamp, connection_id
                );
            }
        }
    }

    /// Current quality measurement for a connection.
    ///
    /// A connection with no completed probes yet reads as good; the first
    /// heartbeat window corrects this within a second.
    pub async fn quality(&self, connection_id: ConnectionId) -> ConnectionQuality {
        let connections = self.connections.read().await;
        match connections.get(&connection_id) {
            Some(history) => {
                ConnectionQuality::new(history.rtt_ms.unwrap_or(0.0), history.loss_ratio())
            }
            None => ConnectionQuality::default(),
        }
    }

    /// Mean RTT and mean loss ratio across a set of connections - the
    /// room-cadence policy input.
    pub async fn room_mean(&self, members: &[ConnectionId]) -> (f64, f64) {
        if members.is_empty() {
            return (0.0, 0.0);
        }
        let connections = self.connections.read().await;
        let mut rtt_sum = 0.0;
        let mut loss_sum = 0.0;
        for connection_id in members {
            if let Some(history) = connections.get(connection_id) {
                rtt_sum += history.rtt_ms.unwrap_or(0.0);
                loss_sum += history.loss_ratio();
            }
        }
        (
            rtt_sum / members.len() as f64,
            loss_sum / members.len() as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_protocol::QualityTier;

    fn estimator() -> QualityEstimator {
        QualityEstimator::new(10, Duration::from_millis(0))
    }

    #[tokio::test]
    async fn echo_produces_rtt_measurement() {
        let est = QualityEstimator::new(10, Duration::from_secs(1));
        est.track(1).await;

        // Simulate a probe that has been in flight for ~120 ms.
        let sent = current_timestamp() - 120;
        est.record_probe(1, sent).await;
        est.record_echo(1, sent).await;

        let quality = est.quality(1).await;
        assert!(quality.rtt_ms >= 115.0 && quality.rtt_ms <= 140.0);
        assert_eq!(quality.tier, QualityTier::Medium);
        assert_eq!(quality.loss_ratio, 0.0);
    }

    #[tokio::test]
    async fn unanswered_probe_counts_as_one_loss() {
        // Zero timeout: any outstanding probe sweeps as lost immediately.
        let est = estimator();
        est.track(1).await;
        est.record_probe(1, current_timestamp()).await;
        est.sweep_expired().await;

        let quality = est.quality(1).await;
        assert_eq!(quality.loss_ratio, 1.0);
        assert_eq!(quality.tier, QualityTier::Poor);

        // Sweeping again adds no further loss samples for the same probe.
        est.sweep_expired().await;
        assert_eq!(est.quality(1).await.loss_ratio, 1.0);
    }

    #[tokio::test]
    async fn late_echo_after_sweep_is_ignored() {
        let est = estimator();
        est.track(1).await;
        let sent = current_timestamp();
        est.record_probe(1, sent).await;
        est.sweep_expired().await;
        est.record_echo(1, sent).await;

        let quality = est.quality(1).await;
        assert_eq!(quality.loss_ratio, 1.0);
        assert_eq!(quality.rtt_ms, 0.0);
    }

    #[tokio::test]
    async fn loss_window_is_sliding() {
        let est = QualityEstimator::new(4, Duration::from_millis(0));
        est.track(1).await;

        // Two losses, then four clean echoes push them out of the window.
        for _ in 0..2 {
            est.record_probe(1, current_timestamp()).await;
            est.sweep_expired().await;
        }
        assert!(est.quality(1).await.loss_ratio > 0.0);

        for n in 0..4u64 {
            let sent = current_timestamp() - 10 - n;
            est.record_probe(1, sent).await;
            est.record_echo(1, sent).await;
        }
        assert_eq!(est.quality(1).await.loss_ratio, 0.0);
    }

    #[tokio::test]
    async fn room_mean_averages_members() {
        let est = QualityEstimator::new(10, Duration::from_secs(1));
        for (conn, rtt) in [(1usize, 20u64), (2, 100), (3, 300)] {
            est.track(conn).await;
            let sent = current_timestamp() - rtt;
            est.record_probe(conn, sent).await;
            est.record_echo(conn, sent).await;
        }

        let (mean_rtt, mean_loss) = est.room_mean(&[1, 2, 3]).await;
        assert!(mean_rtt >= 135.0 && mean_rtt <= 150.0);
        assert_eq!(mean_loss, 0.0);
        assert_eq!(QualityTier::classify(mean_rtt, mean_loss), QualityTier::Medium);
    }

    #[tokio::test]
    async fn forgotten_connection_reads_default() {
        let est = estimator();
        est.track(1).await;
        est.record_probe(1, current_timestamp()).await;
        est.forget(1).await;
        let quality = est.quality(1).await;
        assert_eq!(quality.loss_ratio, 0.0);
        assert_eq!(quality.tier, QualityTier::Good);
    }
}
