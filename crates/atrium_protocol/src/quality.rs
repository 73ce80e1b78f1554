//! Network quality model shared by estimator and scheduler.
//!
//! Heartbeat measurements (RTT and loss ratio) are discretized into a
//! [`QualityTier`], which drives two independent policies:
//!
//! * room-wide broadcast cadence, from the arithmetic mean RTT of the
//!   room's current members
//! * per-connection payload shape, from that connection's own tier
//!
//! Degradation is the backpressure mechanism: a slow consumer receives
//! fewer, cheaper updates, never an unbounded backlog.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// RTT below this is good (milliseconds).
pub const GOOD_RTT_MS: f64 = 50.0;
/// RTT below this is medium (milliseconds).
pub const MEDIUM_RTT_MS: f64 = 150.0;
/// Loss ratio below this is good.
pub const GOOD_LOSS: f64 = 0.01;
/// Loss ratio below this is medium.
pub const MEDIUM_LOSS: f64 = 0.05;

/// Discretized network-quality class derived from RTT and loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Good,
    Medium,
    Poor,
}

impl QualityTier {
    /// Classifies a measured RTT and loss ratio.
    ///
    /// A connection must clear both the RTT and the loss threshold of a
    /// tier to earn it; failing either pushes it down.
    pub fn classify(rtt_ms: f64, loss_ratio: f64) -> Self {
        if rtt_ms < GOOD_RTT_MS && loss_ratio < GOOD_LOSS {
            Self::Good
        } else if rtt_ms < MEDIUM_RTT_MS && loss_ratio < MEDIUM_LOSS {
            Self::Medium
        } else {
            Self::Poor
        }
    }

    /// Room-wide broadcast interval for this tier: 30 Hz / 20 Hz / 10 Hz.
    pub fn broadcast_interval(&self) -> Duration {
        match self {
            Self::Good => Duration::from_millis(33),
            Self::Medium => Duration::from_millis(50),
            Self::Poor => Duration::from_millis(100),
        }
    }
}

/// Measured quality of a single connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionQuality {
    /// Smoothed round-trip time in milliseconds
    pub rtt_ms: f64,
    /// Fraction of recent probes that went unanswered
    pub loss_ratio: f64,
    /// Tier derived from the two measurements
    pub tier: QualityTier,
}

impl ConnectionQuality {
    pub fn new(rtt_ms: f64, loss_ratio: f64) -> Self {
        Self {
            rtt_ms,
            loss_ratio,
            tier: QualityTier::classify(rtt_ms, loss_ratio),
        }
    }
}

impl Default for ConnectionQuality {
    /// A connection with no measurements yet is assumed good; the first
    /// heartbeat window corrects this within a second.
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Arithmetic mean of member RTTs, the room cadence policy input.
///
/// An empty member list yields 0.0 (a room of unmeasured connections runs
/// at the good-tier cadence until data arrives).
pub fn mean_rtt(rtts: &[f64]) -> f64 {
    if rtts.is_empty() {
        return 0.0;
    }
    rtts.iter().sum::<f64>() / rtts.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        assert_eq!(QualityTier::classify(20.0, 0.0), QualityTier::Good);
        assert_eq!(QualityTier::classify(49.9, 0.009), QualityTier::Good);
        assert_eq!(QualityTier::classify(50.0, 0.0), QualityTier::Medium);
        assert_eq!(QualityTier::classify(100.0, 0.04), QualityTier::Medium);
        assert_eq!(QualityTier::classify(20.0, 0.02), QualityTier::Medium);
        assert_eq!(QualityTier::classify(200.0, 0.0), QualityTier::Poor);
        assert_eq!(QualityTier::classify(20.0, 0.10), QualityTier::Poor);
    }

    #[test]
    fn tier_intervals() {
        assert_eq!(
            QualityTier::Good.broadcast_interval(),
            Duration::from_millis(33)
        );
        assert_eq!(
            QualityTier::Medium.broadcast_interval(),
            Duration::from_millis(50)
        );
        assert_eq!(
            QualityTier::Poor.broadcast_interval(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn room_cadence_from_mean_rtt_is_stable_under_jitter() {
        // Three members at 20/100/300 ms average to 140 ms: medium cadence.
        let base = [20.0, 100.0, 300.0];
        let mean = mean_rtt(&base);
        assert_eq!(QualityTier::classify(mean, 0.0), QualityTier::Medium);

        // +/- 5 ms of jitter on every member never crosses a tier boundary.
        for jitter in [-5.0, -2.5, 0.0, 2.5, 5.0] {
            let jittered: Vec<f64> = base.iter().map(|r| r + jitter).collect();
            let mean = mean_rtt(&jittered);
            assert_eq!(QualityTier::classify(mean, 0.0), QualityTier::Medium);
        }
    }

    #[test]
    fn empty_room_defaults_to_good_cadence() {
        assert_eq!(QualityTier::classify(mean_rtt(&[]), 0.0), QualityTier::Good);
    }
}
