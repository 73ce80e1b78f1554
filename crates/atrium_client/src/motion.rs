//! Local entity motion with wall collision.
//!
//! Motion is straight-line toward a requested target point, advanced each
//! tick by `speed × Δt` capped at the remaining distance. Before a step
//! commits, the segment from the current to the proposed position is
//! tested against every wall segment - the segment, not just the
//! endpoint, so large per-tick steps cannot tunnel through a wall. A
//! predicted collision halts motion at the last valid position and clears
//! the pending target.

use atrium_protocol::{Direction, Position};
use std::time::Duration;
use tracing::debug;

/// Distance to target below which the position snaps exactly and motion
/// state clears.
pub const ARRIVAL_EPSILON: f64 = 0.01;

/// Determinant magnitude below which two segments are treated as parallel
/// or degenerate - "no intersection", never an error.
const PARALLEL_EPSILON: f64 = 1e-10;

/// A wall as a line segment in room-local coordinates, supplied by the
/// external map collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallSegment {
    pub a: Position,
    pub b: Position,
}

impl WallSegment {
    pub fn new(ax: f64, ay: f64, bx: f64, by: f64) -> Self {
        Self {
            a: Position::new(ax, ay),
            b: Position::new(bx, by),
        }
    }
}

/// Drives the local entity's own motion and collision checks.
///
/// A new motion request supersedes any in-flight one. Facing direction is
/// recomputed from the dominant axis of each committed step.
#[derive(Debug, Clone)]
pub struct MotionController {
    position: Position,
    direction: Direction,
    /// Movement speed in units per second
    speed: f64,
    target: Option<Position>,
    walls: Vec<WallSegment>,
}

impl MotionController {
    pub fn new(start: Position, speed: f64) -> Self {
        Self {
            position: start,
            direction: Direction::default(),
            speed,
            target: None,
            walls: Vec::new(),
        }
    }

    /// Replaces the room collision geometry.
    pub fn set_walls(&mut self, walls: Vec<WallSegment>) {
        self.walls = walls;
    }

    /// Requests motion toward a target point, superseding any in-flight
    /// request.
    pub fn move_toward(&mut self, target: Position) {
        self.target = Some(target);
    }

    /// Clears any pending motion without moving.
    pub fn cancel(&mut self) {
        self.target = None;
    }

    /// Advances motion by one tick of `dt`. Returns whether the position
    /// changed.
    ///
    /// Already being at the target is an idempotent no-op: the pending
    /// state clears and the position stays put.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(target) = self.target else {
            return false;
        };

        let remaining = self.position.distance(target);
        let step = self.speed * dt.as_secs_f64();
        let proposed = if step + ARRIVAL_EPSILON >= remaining {
            target
        } else {
            let scale = step / remaining;
            Position::new(
                self.position.x + (target.x - self.position.x) * scale,
                self.position.y + (target.y - self.position.y) * scale,
            )
        };

        // Test the whole step segment against every wall before committing.
        if self
            .walls
            .iter()
            .any(|wall| segments_intersect(self.position, proposed, wall.a, wall.b))
        {
            debug!("🧱 Motion blocked at ({:.2}, {:.2})", self.position.x, self.position.y);
            self.target = None;
            return false;
        }

        let dx = proposed.x - self.position.x;
        let dy = proposed.y - self.position.y;
        if let Some(direction) = Direction::from_vector(dx, dy) {
            self.direction = direction;
        }

        let moved = proposed != self.position;
        self.position = proposed;
        if self.position == target {
            self.target = None;
        }
        moved
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_moving(&self) -> bool {
        self.target.is_some()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

/// Standard 2D segment–segment intersection test.
///
/// Solves for parameters t, u ∈ \[0, 1\] via the determinant of the two
/// direction vectors. A near-zero determinant (parallel or degenerate
/// segments, including zero-length walls) is "no intersection".
fn segments_intersect(p1: Position, p2: Position, q1: Position, q2: Position) -> bool {
    let rx = p2.x - p1.x;
    let ry = p2.y - p1.y;
    let sx = q2.x - q1.x;
    let sy = q2.y - q1.y;

    let denom = rx * sy - ry * sx;
    if denom.abs() < PARALLEL_EPSILON {
        return false;
    }

    let qpx = q1.x - p1.x;
    let qpy = q1.y - p1.y;
    let t = (qpx * sy - qpy * sx) / denom;
    let u = (qpx * ry - qpy * rx) / denom;

    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(1000);

    #[test]
    fn straight_path_arrives_and_snaps() {
        let mut motion = MotionController::new(Position::new(0.0, 0.0), 30.0);
        motion.move_toward(Position::new(100.0, 0.0));

        let mut ticks = 0;
        while motion.is_moving() && ticks < 10 {
            motion.tick(TICK);
            ticks += 1;
        }

        assert_eq!(motion.position(), Position::new(100.0, 0.0));
        assert!(!motion.is_moving());
        assert_eq!(motion.direction(), Direction::Right);
        assert_eq!(ticks, 4); // 30 + 30 + 30 + final capped step
    }

    #[test]
    fn wall_blocks_path_even_with_large_steps() {
        // One step would jump clear across the wall; the segment test
        // still catches it.
        let mut motion = MotionController::new(Position::new(0.0, 0.0), 1000.0);
        motion.set_walls(vec![WallSegment::new(50.0, -10.0, 50.0, 10.0)]);
        motion.move_toward(Position::new(100.0, 0.0));

        for _ in 0..5 {
            motion.tick(TICK);
        }

        assert!(motion.position().x < 50.0);
        assert!(!motion.is_moving());
    }

    #[test]
    fn wall_blocks_path_with_small_steps() {
        let mut motion = MotionController::new(Position::new(0.0, 0.0), 30.0);
        motion.set_walls(vec![WallSegment::new(50.0, -10.0, 50.0, 10.0)]);
        motion.move_toward(Position::new(100.0, 0.0));

        for _ in 0..10 {
            motion.tick(TICK);
        }

        // Halts at the last valid position before the wall.
        assert!(motion.position().x < 50.0);
        assert!(motion.position().x > 0.0);
        assert!(!motion.is_moving());
    }

    #[test]
    fn degenerate_walls_do_not_block() {
        let mut motion = MotionController::new(Position::new(0.0, 0.0), 1000.0);
        motion.set_walls(vec![
            // Zero-length wall sitting right on the path
            WallSegment::new(50.0, 0.0, 50.0, 0.0),
            // Wall parallel to the motion vector
            WallSegment::new(0.0, 5.0, 100.0, 5.0),
        ]);
        motion.move_toward(Position::new(100.0, 0.0));
        motion.tick(TICK);

        assert_eq!(motion.position(), Position::new(100.0, 0.0));
    }

    #[test]
    fn new_request_supersedes_in_flight_motion() {
        let mut motion = MotionController::new(Position::new(0.0, 0.0), 10.0);
        motion.move_toward(Position::new(100.0, 0.0));
        motion.tick(TICK);
        assert_eq!(motion.position(), Position::new(10.0, 0.0));

        motion.move_toward(Position::new(10.0, -100.0));
        motion.tick(TICK);
        assert_eq!(motion.position(), Position::new(10.0, -10.0));
        assert_eq!(motion.direction(), Direction::Up);
    }

    #[test]
    fn arrival_is_idempotent() {
        let start = Position::new(5.0, 5.0);
        let mut motion = MotionController::new(start, 10.0);
        motion.move_toward(start);
        assert!(!motion.tick(TICK));
        assert_eq!(motion.position(), start);
        assert!(!motion.is_moving());

        // Ticking again with no pending target is a no-op.
        assert!(!motion.tick(TICK));
    }

    #[test]
    fn direction_tracks_dominant_axis() {
        let mut motion = MotionController::new(Position::new(0.0, 0.0), 10.0);
        motion.move_toward(Position::new(1.0, 100.0));
        motion.tick(TICK);
        assert_eq!(motion.direction(), Direction::Down);
    }

    #[test]
    fn segment_intersection_basics() {
        let cross = segments_intersect(
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            Position::new(5.0, -5.0),
            Position::new(5.0, 5.0),
        );
        assert!(cross);

        let miss = segments_intersect(
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            Position::new(15.0, -5.0),
            Position::new(15.0, 5.0),
        );
        assert!(!miss);

        let parallel = segments_intersect(
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            Position::new(0.0, 1.0),
            Position::new(10.0, 1.0),
        );
        assert!(!parallel);
    }
}
