//! Receiver-side entity state: interpolation and staleness reaping.
//!
//! Each remote entity is one [`EntityRecord`]. Snapshots set the record's
//! target; the render tick moves the displayed position toward it with
//! exponential smoothing, so a late or lost snapshot shows as a slightly
//! longer glide, never a teleport. Records whose updates stop arriving
//! are reaped on the same tick - silent disconnects need no explicit
//! leave signal.
//!
//! Per-entity state machine:
//! `Absent → (first sample) → Idle → (Δ > jitter) → Moving → (arrived) →
//! Idle → (timeout) → Absent`, with an explicit entity-left message as a
//! fast-path edge straight to `Absent`.

use atrium_protocol::{Direction, EntityId, Position, SnapshotEntity};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Tuning knobs for interpolation and staleness.
#[derive(Debug, Clone)]
pub struct InterpolationConfig {
    /// Smoothing factor k: the fraction of the remaining distance covered
    /// per nominal frame
    pub smoothing: f64,

    /// Nominal frame duration the smoothing factor is defined against
    pub frame_budget: Duration,

    /// Positional delta below which an update does not count as movement
    pub jitter_threshold: f64,

    /// Remaining distance below which display snaps to target
    pub snap_distance: f64,

    /// Records silent for longer than this are removed; several
    /// heartbeat periods so one lost probe window never drops an entity
    pub stale_timeout: Duration,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.2,
            frame_budget: Duration::from_micros(16_667), // 60 Hz
            jitter_threshold: 0.25,
            snap_distance: 1.0,
            stale_timeout: Duration::from_secs(5),
        }
    }
}

/// Tracked state of one remote entity.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: EntityId,
    pub display_name: String,
    /// Latest position reported by the server
    pub server_position: Position,
    /// Position currently shown on screen; converges toward target
    pub display_position: Position,
    /// Position the display is converging toward
    pub target_position: Position,
    /// Server position before the latest update
    pub previous_position: Position,
    pub direction: Direction,
    pub is_moving: bool,
    /// Opaque per-entity payload, relayed to the renderer untouched
    pub auxiliary: serde_json::Value,
    /// Local receipt instant of the latest update, drives staleness
    pub last_update: Instant,
    /// Sample clock of the latest update, Unix milliseconds
    pub last_server_update: u64,
}

impl EntityRecord {
    fn from_snapshot(entity: SnapshotEntity, now: Instant) -> Self {
        Self {
            id: entity.entity_id,
            display_name: entity.display_name,
            server_position: entity.position,
            display_position: entity.position,
            target_position: entity.position,
            previous_position: entity.position,
            direction: entity.direction,
            is_moving: false,
            auxiliary: entity.auxiliary,
            last_update: now,
            last_server_update: entity.timestamp,
        }
    }
}

/// What the drawing collaborator gets per render tick.
#[derive(Debug, Clone)]
pub struct RenderedEntity {
    pub entity_id: EntityId,
    pub display_position: Position,
    pub direction: Direction,
    pub is_moving: bool,
    pub auxiliary: serde_json::Value,
}

/// Registry of all live remote entities for one room.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, EntityRecord>,
    config: InterpolationConfig,
}

impl EntityRegistry {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            entities: HashMap::new(),
            config,
        }
    }

    /// Applies one snapshot entry.
    ///
    /// An unseen id creates a record with server, target, and display all
    /// at the received value - a new entity appears in place rather than
    /// gliding in from somewhere. A known id shifts the previous
    /// position, retargets, and refreshes both timestamps. Whichever
    /// update is applied last wins; timestamps are not used to reorder.
    pub fn apply_entity(&mut self, entity: SnapshotEntity, now: Instant) {
        match self.entities.get_mut(&entity.entity_id) {
            None => {
                trace!("Entity {} appeared", entity.entity_id);
                self.entities
                    .insert(entity.entity_id, EntityRecord::from_snapshot(entity, now));
            }
            Some(record) => {
                let delta = record.server_position.distance(entity.position);
                record.previous_position = record.server_position;
                record.server_position = entity.position;
                record.target_position = entity.position;
                record.direction = entity.direction;
                record.display_name = entity.display_name;
                record.auxiliary = entity.auxiliary;
                record.last_update = now;
                record.last_server_update = entity.timestamp;
                if delta > self.config.jitter_threshold {
                    record.is_moving = true;
                }
            }
        }
    }

    /// Applies every entry of a room snapshot.
    pub fn apply_snapshot<I>(&mut self, entities: I, now: Instant)
    where
        I: IntoIterator<Item = SnapshotEntity>,
    {
        for entity in entities {
            self.apply_entity(entity, now);
        }
    }

    /// Fast-path removal for an explicit entity-left message.
    pub fn entity_left(&mut self, entity_id: EntityId) -> bool {
        let removed = self.entities.remove(&entity_id).is_some();
        if removed {
            debug!("Entity {} left", entity_id);
        }
        removed
    }

    /// Advances every live record by one render tick of `dt` and reaps
    /// stale ones, returning the list to draw.
    ///
    /// The displayed position covers `clamp(k·Δt/frame_budget, 0, 1)` of
    /// its remaining distance - exponential smoothing, so convergence is
    /// monotonic and framerate-independent. Once the remaining distance
    /// drops below the snap threshold the record lands exactly on target
    /// and stops moving.
    pub fn render_tick(&mut self, now: Instant, dt: Duration) -> Vec<RenderedEntity> {
        let stale_timeout = self.config.stale_timeout;
        self.entities.retain(|entity_id, record| {
            let live = now.duration_since(record.last_update) <= stale_timeout;
            if !live {
                debug!("Entity {} reaped after silence", entity_id);
            }
            live
        });

        let alpha = (self.config.smoothing * dt.as_secs_f64()
            / self.config.frame_budget.as_secs_f64())
        .clamp(0.0, 1.0);

        let mut rendered = Vec::with_capacity(self.entities.len());
        for record in self.entities.values_mut() {
            record.display_position.x +=
                (record.target_position.x - record.display_position.x) * alpha;
            record.display_position.y +=
                (record.target_position.y - record.display_position.y) * alpha;

            if record.display_position.distance(record.target_position) < self.config.snap_distance
            {
                record.display_position = record.target_position;
                record.is_moving = false;
            }

            rendered.push(RenderedEntity {
                entity_id: record.id,
                display_position: record.display_position,
                direction: record.direction,
                is_moving: record.is_moving,
                auxiliary: record.auxiliary.clone(),
            });
        }
        rendered
    }

    /// Looks up one record, mainly for tests and debugging overlays.
    pub fn get(&self, entity_id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drops every record, e.g. when leaving a room.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_micros(16_667);

    fn snapshot_entity(id: EntityId, x: f64, y: f64, timestamp: u64) -> SnapshotEntity {
        SnapshotEntity {
            entity_id: id,
            display_name: "remote".to_string(),
            position: Position::new(x, y),
            direction: Direction::Right,
            auxiliary: serde_json::Value::Null,
            timestamp,
        }
    }

    fn registry() -> EntityRegistry {
        EntityRegistry::new(InterpolationConfig::default())
    }

    #[test]
    fn first_sample_creates_record_in_place() {
        let mut reg = registry();
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 10.0, 20.0, 1), now);

        let record = reg.get(id).unwrap();
        assert_eq!(record.display_position, Position::new(10.0, 20.0));
        assert_eq!(record.target_position, Position::new(10.0, 20.0));
        assert_eq!(record.server_position, Position::new(10.0, 20.0));
        assert!(!record.is_moving);
    }

    #[test]
    fn display_converges_monotonically_within_thirty_ticks() {
        let mut reg = registry();
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 100.0, 100.0, 1), now);
        reg.apply_entity(snapshot_entity(id, 300.0, 100.0, 2), now);
        assert!(reg.get(id).unwrap().is_moving);

        let mut previous_x = 100.0;
        let mut converged_at = None;
        for tick in 1..=30 {
            reg.render_tick(now, FRAME);
            let record = reg.get(id).unwrap();
            assert!(
                record.display_position.x >= previous_x,
                "display.x regressed at tick {tick}"
            );
            previous_x = record.display_position.x;
            if (300.0 - record.display_position.x).abs() < 1.0 {
                converged_at = Some(tick);
                break;
            }
        }

        let tick = converged_at.expect("did not converge within 30 ticks");
        assert!(tick <= 30);
        let record = reg.get(id).unwrap();
        assert_eq!(record.display_position, Position::new(300.0, 100.0));
        assert!(!record.is_moving);
    }

    #[test]
    fn identical_resend_is_idempotent_once_converged() {
        let mut reg = registry();
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 50.0, 50.0, 1), now);
        reg.render_tick(now, FRAME);

        let before = reg.get(id).unwrap().display_position;
        reg.apply_entity(snapshot_entity(id, 50.0, 50.0, 2), now);
        reg.render_tick(now, FRAME);
        let after = reg.get(id).unwrap().display_position;

        assert_eq!(before, after);
        assert!(!reg.get(id).unwrap().is_moving);
    }

    #[test]
    fn jitter_below_threshold_does_not_count_as_movement() {
        let mut reg = registry();
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 50.0, 50.0, 1), now);
        reg.apply_entity(snapshot_entity(id, 50.1, 50.0, 2), now);

        let record = reg.get(id).unwrap();
        assert!(!record.is_moving);
        // The target still tracks the newest sample.
        assert_eq!(record.target_position, Position::new(50.1, 50.0));
    }

    #[test]
    fn last_applied_sample_wins_regardless_of_timestamps() {
        let mut reg = registry();
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 1.0, 0.0, 2000), now);
        reg.apply_entity(snapshot_entity(id, 2.0, 0.0, 1000), now);

        let record = reg.get(id).unwrap();
        assert_eq!(record.target_position, Position::new(2.0, 0.0));
        assert_eq!(record.last_server_update, 1000);
    }

    #[test]
    fn silent_entity_is_reaped_within_one_tick() {
        let mut reg = EntityRegistry::new(InterpolationConfig {
            stale_timeout: Duration::from_millis(100),
            ..InterpolationConfig::default()
        });
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 1.0, 1.0, 1), now);

        let rendered = reg.render_tick(now + Duration::from_millis(50), FRAME);
        assert_eq!(rendered.len(), 1);

        let rendered = reg.render_tick(now + Duration::from_millis(150), FRAME);
        assert!(rendered.is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn entity_left_is_an_immediate_removal() {
        let mut reg = registry();
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 1.0, 1.0, 1), now);

        assert!(reg.entity_left(id));
        assert!(reg.is_empty());
        assert!(!reg.entity_left(id));
    }

    #[test]
    fn moving_record_shifts_previous_position() {
        let mut reg = registry();
        let id = EntityId::new();
        let now = Instant::now();
        reg.apply_entity(snapshot_entity(id, 10.0, 0.0, 1), now);
        reg.apply_entity(snapshot_entity(id, 20.0, 0.0, 2), now);
        reg.apply_entity(snapshot_entity(id, 30.0, 0.0, 3), now);

        let record = reg.get(id).unwrap();
        assert_eq!(record.previous_position, Position::new(20.0, 0.0));
        assert_eq!(record.server_position, Position::new(30.0, 0.0));
        assert!(record.is_moving);
    }
}
