//! Fixed-cadence outbound position sampling.
//!
//! One transmitter runs per active room membership, on its own tokio
//! task. Each tick it reads the *current* local pose from a watch channel
//! - never a queued history - and emits one full-state sample. There is
//! no acknowledgment, no retry, and no outbound queue: a dropped send is
//! simply superseded by the next tick. Leaving the room aborts the task
//! immediately.

use atrium_protocol::{
    current_timestamp, ClientMessage, Direction, EntityId, Position, PositionSample, RoomId,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

/// Default sampling cadence: 20 Hz.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// The local entity's pose as published by the motion loop and read by
/// the sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    pub position: Position,
    pub direction: Direction,
}

/// Handle to the running sampler task for one room membership.
///
/// The task stops when [`stop`](Self::stop) is called, when the handle is
/// dropped, or when the outbound channel closes (the transport went
/// away) - whichever comes first.
#[derive(Debug)]
pub struct SyncTransmitter {
    handle: JoinHandle<()>,
}

impl SyncTransmitter {
    /// Spawns the sampler task at the given cadence.
    ///
    /// `pose` is read-only from the sampler's side; the motion loop owns
    /// the value and publishes updates into the channel.
    pub fn spawn(
        room_id: RoomId,
        entity_id: EntityId,
        display_name: String,
        auxiliary: serde_json::Value,
        pose: watch::Receiver<LocalPose>,
        outbound: mpsc::UnboundedSender<ClientMessage>,
        sample_interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(sample_interval);
            loop {
                ticker.tick().await;
                let current = *pose.borrow();
                let sample = PositionSample {
                    room_id: room_id.clone(),
                    entity_id,
                    display_name: display_name.clone(),
                    position: current.position,
                    direction: current.direction,
                    auxiliary: auxiliary.clone(),
                    timestamp: current_timestamp(),
                };
                if outbound.send(ClientMessage::PositionSample(sample)).is_err() {
                    debug!("Outbound channel closed; sampler for {} stopping", entity_id);
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Stops the sampler immediately. Idempotent.
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Whether the sampler task is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SyncTransmitter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    fn pose(x: f64) -> LocalPose {
        LocalPose {
            position: Position::new(x, 0.0),
            direction: Direction::Right,
        }
    }

    async fn next_sample(rx: &mut mpsc::UnboundedReceiver<ClientMessage>) -> PositionSample {
        let message = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for sample")
            .expect("channel closed");
        match message {
            ClientMessage::PositionSample(sample) => sample,
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn samples_carry_the_current_pose_not_history() {
        let (pose_tx, pose_rx) = watch::channel(pose(1.0));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let transmitter = SyncTransmitter::spawn(
            RoomId::from("lobby"),
            EntityId::new(),
            "ada".to_string(),
            serde_json::Value::Null,
            pose_rx,
            out_tx,
            Duration::from_millis(10),
        );

        let first = next_sample(&mut out_rx).await;
        assert_eq!(first.position.x, 1.0);

        // Publish several poses between ticks; the next sample reflects
        // only the latest.
        pose_tx.send_replace(pose(2.0));
        pose_tx.send_replace(pose(3.0));
        sleep(Duration::from_millis(25)).await;
        // Drain whatever was emitted and look at the most recent.
        let mut latest = next_sample(&mut out_rx).await;
        while let Ok(message) = out_rx.try_recv() {
            if let ClientMessage::PositionSample(sample) = message {
                latest = sample;
            }
        }
        assert_eq!(latest.position.x, 3.0);

        transmitter.stop();
    }

    #[tokio::test]
    async fn stop_halts_sampling_immediately() {
        let (_pose_tx, pose_rx) = watch::channel(pose(1.0));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let transmitter = SyncTransmitter::spawn(
            RoomId::from("lobby"),
            EntityId::new(),
            "ada".to_string(),
            serde_json::Value::Null,
            pose_rx,
            out_tx,
            Duration::from_millis(10),
        );

        next_sample(&mut out_rx).await;
        transmitter.stop();
        sleep(Duration::from_millis(30)).await;

        // Drain anything emitted before the abort landed; nothing more
        // arrives afterwards.
        while out_rx.try_recv().is_ok() {}
        sleep(Duration::from_millis(30)).await;
        assert!(out_rx.try_recv().is_err());
        assert!(!transmitter.is_running());
    }

    #[tokio::test]
    async fn sampler_stops_when_transport_closes() {
        let (_pose_tx, pose_rx) = watch::channel(pose(1.0));
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let transmitter = SyncTransmitter::spawn(
            RoomId::from("lobby"),
            EntityId::new(),
            "ada".to_string(),
            serde_json::Value::Null,
            pose_rx,
            out_tx,
            Duration::from_millis(10),
        );

        drop(out_rx);
        sleep(Duration::from_millis(50)).await;
        assert!(!transmitter.is_running());
    }
}
