//! Utility functions and helper methods for the sync server.
//!
//! This module provides convenient factory functions for creating server
//! instances with different configurations.

use crate::{config::ServerConfig, server::SyncServer};

/// Creates a new sync server with default configuration.
///
/// This is a convenience function for quickly setting up a server with
/// sensible defaults for development and testing.
pub fn create_server() -> SyncServer {
    SyncServer::new(ServerConfig::default())
}

/// Creates a new sync server with custom configuration.
///
/// # Example
///
/// ```rust
/// use atrium_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// ```
pub fn create_server_with_config(config: ServerConfig) -> SyncServer {
    SyncServer::new(config)
}
