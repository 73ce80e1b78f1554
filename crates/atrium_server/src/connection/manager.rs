//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central management system for all client
//! connections, handling connection lifecycle, identity assignment, and
//! outbound message delivery.

use super::{client::ClientConnection, ConnectionId};
use atrium_protocol::{EntityId, RoomId};
use futures_util::sink::SinkExt;
use futures_util::stream::SplitSink;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::info;

/// Central manager for all client connections.
///
/// The `ConnectionManager` tracks active connections, assigns unique IDs,
/// maintains entity/room associations, and delivers outbound frames. It
/// uses async-safe data structures to handle concurrent access from
/// multiple connection handlers.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection storage
/// * Implements atomic connection ID generation
/// * Provides a broadcast channel for outgoing messages; each connection
///   handler subscribes and filters for its own ID
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,
    ws_senders: Arc<
        RwLock<
            HashMap<
                ConnectionId,
                Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<tokio::net::TcpStream>, Message>>>,
            >,
        >,
    >,

    /// Atomic counter for generating unique connection IDs
    next_id: Arc<std::sync::atomic::AtomicUsize>,

    /// Broadcast sender for outgoing messages to specific connections
    sender: broadcast::Sender<(ConnectionId, String)>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    ///
    /// Initializes the internal data structures and broadcast channel
    /// with a reasonable buffer size for message queuing.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            ws_senders: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(std::sync::atomic::AtomicUsize::new(1)),
            sender,
        }
    }

    /// Adds a new connection and returns its unique ID.
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let connection_id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr);
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Register the WebSocket sender for a connection
    pub async fn register_ws_sender(
        &self,
        connection_id: ConnectionId,
        ws_sender: Arc<
            tokio::sync::Mutex<SplitSink<WebSocketStream<tokio::net::TcpStream>, Message>>,
        >,
    ) {
        let mut senders = self.ws_senders.write().await;
        senders.insert(connection_id, ws_sender);
    }

    /// Remove the WebSocket sender for a connection
    pub async fn remove_ws_sender(&self, connection_id: ConnectionId) {
        let mut senders = self.ws_senders.write().await;
        senders.remove(&connection_id);
    }

    /// Disconnects a connection, sending a close frame first.
    pub async fn close_connection(&self, connection_id: ConnectionId, reason: Option<String>) {
        let senders = self.ws_senders.read().await;
        if let Some(ws_sender) = senders.get(&connection_id) {
            let mut ws_sender = ws_sender.lock().await;
            use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
            let close_msg = Message::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
                code: CloseCode::Normal,
                reason: reason.unwrap_or_else(|| "Closed by server".into()).into(),
            }));
            let _ = ws_sender.send(close_msg).await;
        }
        drop(senders);
        self.remove_connection(connection_id).await;
        self.remove_ws_sender(connection_id).await;
    }

    /// Removes a connection from the manager.
    ///
    /// Cleans up the connection entry and logs the disconnection. Called
    /// when a client disconnects or times out.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
    }

    /// Records the entity identity a connection announced at join time.
    pub async fn set_identity(
        &self,
        connection_id: ConnectionId,
        entity_id: EntityId,
        display_name: String,
    ) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.entity_id = Some(entity_id);
            connection.display_name = Some(display_name);
        }
    }

    /// Retrieves the entity ID associated with a connection.
    pub async fn get_entity_id(&self, connection_id: ConnectionId) -> Option<EntityId> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).and_then(|c| c.entity_id)
    }

    /// Records the room a connection has joined.
    pub async fn set_room(&self, connection_id: ConnectionId, room: Option<RoomId>) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.room = room;
        }
    }

    /// Retrieves the room a connection currently belongs to.
    pub async fn get_room(&self, connection_id: ConnectionId) -> Option<RoomId> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).and_then(|c| c.room.clone())
    }

    /// Number of currently tracked connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// All currently tracked connection IDs.
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.read().await.keys().copied().collect()
    }

    /// Sends a text frame to a specific connection.
    ///
    /// Queues the frame for delivery through the internal broadcast
    /// channel; the connection's outgoing task picks it up. Send failures
    /// mean no handler is listening (connection already gone) and are
    /// logged, not surfaced - a dropped frame is superseded by the next
    /// flush anyway.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, frame: String) {
        if let Err(e) = self.sender.send((connection_id, frame)) {
            tracing::debug!(
                "Dropped frame for connection {}: no active receiver ({:?})",
                connection_id,
                e
            );
        }
    }

    /// Creates a new receiver for outgoing messages.
    ///
    /// Each connection handler should call this to get a receiver for
    /// frames targeted at its specific connection.
    pub fn subscribe(&self) -> broadcast::Receiver<(ConnectionId, String)> {
        self.sender.subscribe()
    }

    /// Finds the connection ID associated with an entity.
    pub async fn get_connection_id_by_entity(&self, entity_id: EntityId) -> Option<ConnectionId> {
        let connections = self.connections.read().await;
        for (conn_id, connection) in connections.iter() {
            if connection.entity_id == Some(entity_id) {
                return Some(*conn_id);
            }
        }
        None
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
