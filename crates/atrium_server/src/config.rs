//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default
//! values used to initialize and customize sync server behavior.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the sync server.
///
/// Contains all parameters governing network behavior, heartbeat
/// measurement, and the synchronization cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Heartbeat measurement settings
    pub heartbeat: HeartbeatConfig,

    /// Synchronization cycle settings
    pub sync: SyncConfig,
}

/// Heartbeat probe configuration for network quality measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Interval between probes in milliseconds
    pub interval_ms: u64,

    /// Number of recent probes the loss ratio is computed over
    pub window: usize,
}

impl HeartbeatConfig {
    /// Probe interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Synchronization cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base tick of the flush cycle in milliseconds. Each tick checks
    /// every room against its adaptive interval and skips rooms whose
    /// interval has not yet elapsed, so this only bounds cadence
    /// granularity, not cadence itself.
    pub flush_tick_ms: u64,

    /// Samples older than this are dropped from room buffers at flush
    /// time and never resent, in milliseconds
    pub max_sample_age_ms: u64,

    /// Hard cap on entities per room; joins beyond it are rejected
    pub max_entities_per_room: usize,
}

impl SyncConfig {
    /// Flush tick as a [`Duration`].
    pub fn flush_tick(&self) -> Duration {
        Duration::from_millis(self.flush_tick_ms)
    }

    /// Maximum sample age as a [`Duration`].
    pub fn max_sample_age(&self) -> Duration {
        Duration::from_millis(self.max_sample_age_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("Invalid default bind address"),
            max_connections: 1000,
            heartbeat: HeartbeatConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            window: 20,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_tick_ms: 10,
            max_sample_age_ms: 5000, // five heartbeat periods
            max_entities_per_room: 64,
        }
    }
}
