//! # Core Type Definitions
//!
//! Fundamental types used throughout the atrium sync system. These provide
//! the building blocks for room membership, entity identification, and
//! 2D positioning.
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types prevent ID confusion (EntityId vs RoomId)
//! - **Serialization**: All types serialize to JSON for network transmission
//! - **Precision**: Double-precision floats for room-local positioning

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a synchronized entity (a participant's avatar).
///
/// This is a wrapper around UUID that provides type safety and ensures
/// entity IDs cannot be confused with other kinds of IDs in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Creates a new random entity ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an entity ID from a string representation.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a logical room - the group of connections sharing one
/// synchronized space.
///
/// Rooms are named by the external room/map collaborator, so this wraps a
/// string rather than a generated UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a room ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 2D position in room-local coordinates.
///
/// Uses double precision so repeated interpolation steps do not accumulate
/// visible error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate (east-west axis)
    pub x: f64,
    /// Y coordinate (north-south axis)
    pub y: f64,
}

impl Position {
    /// Creates a new position with the specified coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Facing direction of an entity, derived from its movement vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// Derives the facing direction from the dominant axis of a movement
    /// vector. Ties resolve to the horizontal axis, which keeps facing
    /// stable during the common horizontal drag motion.
    ///
    /// A zero vector returns `None`; callers keep the previous facing.
    pub fn from_vector(dx: f64, dy: f64) -> Option<Self> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        if dx.abs() >= dy.abs() {
            Some(if dx > 0.0 { Self::Right } else { Self::Left })
        } else {
            Some(if dy > 0.0 { Self::Down } else { Self::Up })
        }
    }
}

/// Returns the current Unix timestamp in milliseconds.
///
/// All wire timestamps use this function so RTT math and staleness checks
/// work from one consistent clock. Millisecond resolution is required:
/// heartbeat RTTs are classified against sub-100ms thresholds.
///
/// # Panics
///
/// Panics if the system clock is set before the Unix epoch, which should
/// never happen on a correctly configured host.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_dominant_axis() {
        assert_eq!(Direction::from_vector(5.0, 1.0), Some(Direction::Right));
        assert_eq!(Direction::from_vector(-5.0, 1.0), Some(Direction::Left));
        assert_eq!(Direction::from_vector(1.0, 5.0), Some(Direction::Down));
        assert_eq!(Direction::from_vector(1.0, -5.0), Some(Direction::Up));
    }

    #[test]
    fn direction_tie_prefers_horizontal() {
        assert_eq!(Direction::from_vector(3.0, 3.0), Some(Direction::Right));
        assert_eq!(Direction::from_vector(-3.0, -3.0), Some(Direction::Left));
    }

    #[test]
    fn direction_zero_vector_is_none() {
        assert_eq!(Direction::from_vector(0.0, 0.0), None);
    }

    #[test]
    fn position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), "\"up\"");
        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), "\"left\"");
    }
}
