//! Last-write-wins buffer of the most recent sample per entity.
//!
//! Entries are overwritten, never appended - memory is O(live entities),
//! never O(messages). Out-of-order arrival is not corrected: whichever
//! sample is applied last wins, by design.

use atrium_protocol::{EntityId, PositionSample};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A buffered sample plus the instant it arrived, used for max-age GC.
#[derive(Debug, Clone)]
struct BufferedSample {
    sample: PositionSample,
    received_at: Instant,
}

/// Most-recent-sample buffer for one room.
#[derive(Debug, Default)]
pub struct RoomBuffer {
    entries: HashMap<EntityId, BufferedSample>,
}

impl RoomBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a sample, unconditionally overwriting any prior entry for
    /// the same entity.
    pub fn apply(&mut self, sample: PositionSample) {
        self.entries.insert(
            sample.entity_id,
            BufferedSample {
                sample,
                received_at: Instant::now(),
            },
        );
    }

    /// Removes an entity's entry, if present. The explicit-leave fast path.
    pub fn remove(&mut self, entity_id: EntityId) -> bool {
        self.entries.remove(&entity_id).is_some()
    }

    /// Collects all entries newer than `max_age` for a snapshot, dropping
    /// older ones from the buffer in the same pass.
    ///
    /// Dropped entries are gone for good: a ghost entity is never resent,
    /// and the buffer stays bounded without a separate sweep. Returns the
    /// fresh samples and the number of entries garbage-collected.
    pub fn collect_fresh(&mut self, max_age: Duration, now: Instant) -> (Vec<PositionSample>, usize) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.received_at) <= max_age);
        let reaped = before - self.entries.len();
        let fresh = self
            .entries
            .values()
            .map(|entry| entry.sample.clone())
            .collect();
        (fresh, reaped)
    }

    /// Latest applied sample for an entity, if buffered.
    pub fn get(&self, entity_id: EntityId) -> Option<&PositionSample> {
        self.entries.get(&entity_id).map(|entry| &entry.sample)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
