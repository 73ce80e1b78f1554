//! Configuration management for the atrium sync server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use atrium_server::{HeartbeatConfig, ServerConfig, SyncConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

fn default_max_connections() -> usize {
    1000
}

fn default_flush_tick_ms() -> u64 {
    10
}

fn default_max_sample_age_ms() -> u64 {
    5000
}

fn default_max_entities_per_room() -> usize {
    64
}

fn default_heartbeat_interval_ms() -> u64 {
    1000
}

fn default_heartbeat_window() -> usize {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Synchronization cycle settings
    #[serde(default)]
    pub sync: SyncSettings,
    /// Heartbeat measurement settings
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: default_max_connections(),
        }
    }
}

/// Synchronization cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base tick of the flush cycle in milliseconds
    #[serde(default = "default_flush_tick_ms")]
    pub flush_tick_ms: u64,
    /// Buffer entries older than this are dropped at flush time
    #[serde(default = "default_max_sample_age_ms")]
    pub max_sample_age_ms: u64,
    /// Hard cap on entities per room
    #[serde(default = "default_max_entities_per_room")]
    pub max_entities_per_room: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            flush_tick_ms: default_flush_tick_ms(),
            max_sample_age_ms: default_max_sample_age_ms(),
            max_entities_per_room: default_max_entities_per_room(),
        }
    }
}

/// Heartbeat measurement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    /// Interval between probes in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
    /// Number of recent probes the loss ratio is computed over
    #[serde(default = "default_heartbeat_window")]
    pub window: usize,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
            window: default_heartbeat_window(),
        }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to emit logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file is not an error: defaults are used so the server
    /// runs out of the box. A present-but-invalid file is an error.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let config: AppConfig = toml::from_str(&contents)
                    .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "⚙️ Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("Failed to read {}: {e}", path.display())),
        }
    }

    /// Validates the merged configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {e}", self.server.bind_address))?;
        if self.sync.flush_tick_ms == 0 {
            anyhow::bail!("sync.flush_tick_ms must be greater than zero");
        }
        if self.heartbeat.interval_ms == 0 {
            anyhow::bail!("heartbeat.interval_ms must be greater than zero");
        }
        if self.heartbeat.window == 0 {
            anyhow::bail!("heartbeat.window must be greater than zero");
        }
        if self.sync.max_entities_per_room == 0 {
            anyhow::bail!("sync.max_entities_per_room must be greater than zero");
        }
        Ok(())
    }

    /// Converts the application configuration into the server's config.
    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            heartbeat: HeartbeatConfig {
                interval_ms: self.heartbeat.interval_ms,
                window: self.heartbeat.window,
            },
            sync: SyncConfig {
                flush_tick_ms: self.sync.flush_tick_ms,
                max_sample_age_ms: self.sync.max_sample_age_ms,
                max_entities_per_room: self.sync.max_entities_per_room,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let config = AppConfig::load_from_file(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nbind_address = \"0.0.0.0:9001\"\n\n[sync]\nmax_entities_per_room = 8"
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:9001");
        assert_eq!(config.sync.max_entities_per_room, 8);
        assert_eq!(config.heartbeat.interval_ms, 1000);

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.sync.max_entities_per_room, 8);
    }

    #[tokio::test]
    async fn invalid_bind_address_fails_validation() {
        let config = AppConfig {
            server: ServerSettings {
                bind_address: "not an address".to_string(),
                max_connections: 10,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
